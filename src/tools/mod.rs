//! Tool trait and registry
//!
//! Tools are the functions a model may call during an agent run.
//! Data-backed tools wrap the capability providers.

pub mod finance;
pub mod search;

pub use finance::FinanceTool;
pub use search::WebSearchTool;

use crate::error::AnalystError;
use crate::llm::{FunctionCall, FunctionDeclaration};
use crate::models::{ToolInput, ToolOutput};
use crate::providers::{
    DuckDuckGoClient, FinancialDataProvider, WebSearchProvider, YahooFinanceClient,
};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for a single model-callable tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the accepted parameters
    fn parameters(&self) -> Value;
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declarations handed to the model, in name order
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.list()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| FunctionDeclaration {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    /// Execute a model-requested function call
    pub async fn execute(&self, call: &FunctionCall) -> Result<ToolOutput> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| AnalystError::ToolNotFound(call.name.clone()))?;

        let parameters = if call.args.is_null() {
            Value::Object(Default::default())
        } else {
            call.args.clone()
        };

        tool.execute(&ToolInput {
            tool_name: call.name.clone(),
            parameters,
        })
        .await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The tools an agent descriptor can enable
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ToolKind {
    #[serde(rename = "duckduckgo_search")]
    DuckDuckGoSearch,
    #[serde(rename = "duckduckgo_news")]
    DuckDuckGoNews,
    #[serde(rename = "get_current_stock_price")]
    StockPrice,
    #[serde(rename = "get_stock_fundamentals")]
    StockFundamentals,
    #[serde(rename = "get_analyst_recommendations")]
    AnalystRecommendations,
    #[serde(rename = "get_company_news")]
    CompanyNews,
    #[serde(rename = "get_company_info")]
    CompanyInfo,
    #[serde(rename = "get_income_statements")]
    IncomeStatements,
    #[serde(rename = "get_technical_indicators")]
    TechnicalIndicators,
}

impl ToolKind {
    pub fn is_web_search(&self) -> bool {
        matches!(self, ToolKind::DuckDuckGoSearch | ToolKind::DuckDuckGoNews)
    }

    pub fn function_name(&self) -> &'static str {
        match self {
            ToolKind::DuckDuckGoSearch => "duckduckgo_search",
            ToolKind::DuckDuckGoNews => "duckduckgo_news",
            ToolKind::StockPrice => "get_current_stock_price",
            ToolKind::StockFundamentals => "get_stock_fundamentals",
            ToolKind::AnalystRecommendations => "get_analyst_recommendations",
            ToolKind::CompanyNews => "get_company_news",
            ToolKind::CompanyInfo => "get_company_info",
            ToolKind::IncomeStatements => "get_income_statements",
            ToolKind::TechnicalIndicators => "get_technical_indicators",
        }
    }
}

/// External data sources shared by every tool
#[derive(Clone)]
pub struct Providers {
    pub search: Arc<dyn WebSearchProvider>,
    pub finance: Arc<dyn FinancialDataProvider>,
}

impl Providers {
    /// DuckDuckGo for search, Yahoo Finance for market data
    pub fn live() -> Result<Self> {
        Ok(Self {
            search: Arc::new(DuckDuckGoClient::new()?),
            finance: Arc::new(YahooFinanceClient::new()?),
        })
    }
}

/// Build a registry holding exactly the given tool kinds.
pub fn build_registry(kinds: &[ToolKind], providers: &Providers) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    for kind in kinds {
        let tool: Arc<dyn Tool> = if kind.is_web_search() {
            Arc::new(WebSearchTool::new(*kind, providers.search.clone()))
        } else {
            Arc::new(FinanceTool::new(*kind, providers.finance.clone()))
        };
        registry.register(tool);
    }

    registry
}

fn ensure_object_parameters(input: &ToolInput) -> Result<()> {
    if input.parameters.is_object() {
        Ok(())
    } else {
        Err(AnalystError::InvalidToolInput(
            "tool_input must be a JSON object".to_string(),
        ))
    }
}

fn require_str<'a>(input: &'a ToolInput, key: &str) -> Result<&'a str> {
    input
        .parameters
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            AnalystError::InvalidToolInput(format!(
                "Expected '{}' in {} input",
                key, input.tool_name
            ))
        })
}

/// Optional positive integer parameter, clamped to `max`
fn optional_count(input: &ToolInput, key: &str, default: usize, max: usize) -> usize {
    input
        .parameters
        .get(key)
        .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
        .map(|n| n as usize)
        .filter(|n| *n > 0)
        .unwrap_or(default)
        .min(max)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic providers for tool and agent tests

    use super::*;
    use crate::providers::{NewsHit, NewsItem, PriceQuote, SearchHit};
    use serde_json::json;

    pub struct StubSearch;

    #[async_trait::async_trait]
    impl WebSearchProvider for StubSearch {
        async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
            Ok((0..max_results.min(2))
                .map(|i| SearchHit {
                    title: format!("{} result {}", query, i),
                    url: format!("https://example.com/{}", i),
                    snippet: format!("About {}", query),
                })
                .collect())
        }

        async fn news(&self, query: &str, max_results: usize) -> Result<Vec<NewsHit>> {
            Ok((0..max_results.min(3))
                .map(|i| NewsHit {
                    title: format!("{} story {}", query, i),
                    url: format!("https://example.com/news/{}", i),
                    source: Some("Example Wire".to_string()),
                    excerpt: format!("Latest on {}", query),
                    published_at: None,
                })
                .collect())
        }
    }

    pub struct StubFinance;

    #[async_trait::async_trait]
    impl FinancialDataProvider for StubFinance {
        async fn current_price(&self, symbol: &str) -> Result<PriceQuote> {
            if symbol == "FAIL" {
                return Err(AnalystError::ToolError("No data found".to_string()));
            }
            Ok(PriceQuote {
                symbol: symbol.to_string(),
                currency: Some("USD".to_string()),
                price: 123.45,
                previous_close: Some(120.0),
                change_percent: Some(2.875),
                day_high: None,
                day_low: None,
                fifty_two_week_high: None,
                fifty_two_week_low: None,
            })
        }

        async fn daily_closes(&self, _symbol: &str) -> Result<Vec<f64>> {
            Ok((0..60).map(|i| 100.0 + i as f64).collect())
        }

        async fn fundamentals(&self, symbol: &str) -> Result<Value> {
            Ok(json!({"symbol": symbol, "summaryDetail": {"trailingPE": "30.1"}}))
        }

        async fn company_info(&self, symbol: &str) -> Result<Value> {
            Ok(json!({"symbol": symbol, "assetProfile": {"sector": "Technology"}}))
        }

        async fn analyst_recommendations(&self, symbol: &str) -> Result<Value> {
            Ok(json!({"symbol": symbol, "recommendationTrend": {"trend": []}}))
        }

        async fn financial_statements(&self, symbol: &str) -> Result<Value> {
            Ok(json!({"symbol": symbol, "incomeStatementHistory": {}}))
        }

        async fn company_news(&self, symbol: &str, count: usize) -> Result<Vec<NewsItem>> {
            Ok((0..count)
                .map(|i| NewsItem {
                    title: format!("{} headline {}", symbol, i),
                    publisher: None,
                    link: format!("https://example.com/news/{}", i),
                    published_at: None,
                })
                .collect())
        }
    }

    pub fn stub_providers() -> Providers {
        Providers {
            search: Arc::new(StubSearch),
            finance: Arc::new(StubFinance),
        }
    }
}
