//! Market data tools backed by a [`FinancialDataProvider`]

use super::{ensure_object_parameters, optional_count, require_str, Tool, ToolKind};
use crate::error::AnalystError;
use crate::models::{ToolInput, ToolOutput};
use crate::providers::indicators::IndicatorSnapshot;
use crate::providers::FinancialDataProvider;
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_NEWS_STORIES: usize = 3;
const MAX_NEWS_STORIES: usize = 10;

pub struct FinanceTool {
    kind: ToolKind,
    provider: Arc<dyn FinancialDataProvider>,
}

impl FinanceTool {
    /// `kind` must be one of the market data kinds.
    pub fn new(kind: ToolKind, provider: Arc<dyn FinancialDataProvider>) -> Self {
        Self { kind, provider }
    }
}

#[async_trait::async_trait]
impl Tool for FinanceTool {
    fn name(&self) -> &str {
        self.kind.function_name()
    }

    fn description(&self) -> &str {
        match self.kind {
            ToolKind::StockPrice => {
                "Get the current stock price, daily change and trading range for a ticker symbol."
            }
            ToolKind::StockFundamentals => {
                "Get key fundamentals for a ticker symbol: P/E ratio, market cap, EPS, margins, dividend yield and 52-week range."
            }
            ToolKind::AnalystRecommendations => {
                "Get analyst recommendation trends (strong buy / buy / hold / sell) and price targets for a ticker symbol."
            }
            ToolKind::CompanyNews => {
                "Get the latest news headlines with links for a ticker symbol."
            }
            ToolKind::CompanyInfo => {
                "Get company profile information: sector, industry, employees, website and business summary."
            }
            ToolKind::IncomeStatements => {
                "Get income statement, balance sheet and cash flow history for a ticker symbol."
            }
            ToolKind::TechnicalIndicators => {
                "Get technical indicators computed from six months of daily closes: SMA(20), SMA(50), EMA(20), RSI(14) and MACD(12,26,9)."
            }
            ToolKind::DuckDuckGoSearch | ToolKind::DuckDuckGoNews => "Not a market data tool.",
        }
    }

    fn parameters(&self) -> Value {
        let mut properties = json!({
            "symbol": {"type": "string", "description": "Ticker symbol, e.g. AAPL or NVDA"}
        });

        if self.kind == ToolKind::CompanyNews {
            properties["num_stories"] = json!({
                "type": "integer",
                "description": "Number of stories to return (default 3)"
            });
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": ["symbol"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let symbol = normalize_symbol(require_str(input, "symbol")?)?;

        debug!(tool = self.name(), %symbol, "Fetching market data");

        let data = match self.kind {
            ToolKind::StockPrice => {
                serde_json::to_value(self.provider.current_price(&symbol).await?)?
            }
            ToolKind::StockFundamentals => self.provider.fundamentals(&symbol).await?,
            ToolKind::AnalystRecommendations => {
                self.provider.analyst_recommendations(&symbol).await?
            }
            ToolKind::CompanyInfo => self.provider.company_info(&symbol).await?,
            ToolKind::IncomeStatements => self.provider.financial_statements(&symbol).await?,
            ToolKind::CompanyNews => {
                let count =
                    optional_count(input, "num_stories", DEFAULT_NEWS_STORIES, MAX_NEWS_STORIES);
                json!({ "news": self.provider.company_news(&symbol, count).await? })
            }
            ToolKind::TechnicalIndicators => {
                let closes = self.provider.daily_closes(&symbol).await?;
                if closes.is_empty() {
                    return Err(AnalystError::ToolError(format!(
                        "No price history available for {}",
                        symbol
                    )));
                }
                serde_json::to_value(IndicatorSnapshot::from_closes(&closes))?
            }
            ToolKind::DuckDuckGoSearch | ToolKind::DuckDuckGoNews => {
                return Err(AnalystError::ToolNotFound(format!(
                    "{} is not a market data tool",
                    self.kind.function_name()
                )))
            }
        };

        Ok(ToolOutput::ok(json!({
            "symbol": symbol,
            "data": data,
        })))
    }
}

/// Upper-case and validate a ticker symbol (e.g. `brk-b`, `^GSPC`, `EURUSD=X`).
fn normalize_symbol(raw: &str) -> Result<String> {
    let symbol = raw.trim().to_uppercase();
    let valid = !symbol.is_empty()
        && symbol.len() <= 16
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));

    if valid {
        Ok(symbol)
    } else {
        Err(AnalystError::InvalidToolInput(format!(
            "'{}' is not a valid ticker symbol",
            raw
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::StubFinance;
    use tokio_test::{assert_err, assert_ok};

    fn input(tool: ToolKind, parameters: Value) -> ToolInput {
        ToolInput {
            tool_name: tool.function_name().to_string(),
            parameters,
        }
    }

    async fn run(kind: ToolKind, parameters: Value) -> Result<ToolOutput> {
        FinanceTool::new(kind, Arc::new(StubFinance))
            .execute(&input(kind, parameters))
            .await
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_symbol("brk-b").unwrap(), "BRK-B");
        assert_eq!(normalize_symbol("^gspc").unwrap(), "^GSPC");
        assert!(normalize_symbol("").is_err());
        assert!(normalize_symbol("AAPL; DROP").is_err());
        assert!(normalize_symbol("../etc").is_err());
    }

    #[tokio::test]
    async fn test_stock_price() {
        let output = assert_ok!(run(ToolKind::StockPrice, json!({"symbol": "msft"})).await);
        assert_eq!(output.data["symbol"], "MSFT");
        assert_eq!(output.data["data"]["price"], 123.45);
    }

    #[tokio::test]
    async fn test_company_news_respects_count() {
        let output = assert_ok!(
            run(ToolKind::CompanyNews, json!({"symbol": "NVDA", "num_stories": 2})).await
        );
        assert_eq!(output.data["data"]["news"].as_array().unwrap().len(), 2);

        let default = assert_ok!(run(ToolKind::CompanyNews, json!({"symbol": "NVDA"})).await);
        assert_eq!(
            default.data["data"]["news"].as_array().unwrap().len(),
            DEFAULT_NEWS_STORIES
        );
    }

    #[tokio::test]
    async fn test_technical_indicators() {
        let output =
            assert_ok!(run(ToolKind::TechnicalIndicators, json!({"symbol": "AAPL"})).await);
        let data = &output.data["data"];
        assert_eq!(data["observations"], 60);
        assert_eq!(data["last_close"], 159.0);
        assert!(data["rsi_14"].as_f64().unwrap() > 99.0);
        assert!(data["macd_12_26_9"]["macd"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_provider_errors_propagate() {
        assert_err!(run(ToolKind::StockPrice, json!({"symbol": "FAIL"})).await);
        assert_err!(run(ToolKind::StockPrice, json!({})).await);
    }

    #[test]
    fn test_news_schema_has_count() {
        let tool = FinanceTool::new(ToolKind::CompanyNews, Arc::new(StubFinance));
        assert!(tool.parameters()["properties"].get("num_stories").is_some());

        let price = FinanceTool::new(ToolKind::StockPrice, Arc::new(StubFinance));
        assert!(price.parameters()["properties"].get("num_stories").is_none());
        assert_eq!(price.name(), "get_current_stock_price");
    }
}
