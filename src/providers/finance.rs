//! Financial data provider backed by Yahoo Finance public endpoints
//!
//! Prices come from the chart API, company data from `quoteSummary`
//! (which needs a cookie + crumb session) and headlines from the search API.

use crate::error::AnalystError;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceQuote {
    pub symbol: String,
    pub currency: Option<String>,
    pub price: f64,
    pub previous_close: Option<f64>,
    pub change_percent: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub publisher: Option<String>,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait FinancialDataProvider: Send + Sync {
    async fn current_price(&self, symbol: &str) -> Result<PriceQuote>;
    /// Daily closes for roughly the last six months, oldest first
    async fn daily_closes(&self, symbol: &str) -> Result<Vec<f64>>;
    async fn fundamentals(&self, symbol: &str) -> Result<Value>;
    async fn company_info(&self, symbol: &str) -> Result<Value>;
    async fn analyst_recommendations(&self, symbol: &str) -> Result<Value>;
    /// Income statement, balance sheet and cash flow history
    async fn financial_statements(&self, symbol: &str) -> Result<Value>;
    async fn company_news(&self, symbol: &str, count: usize) -> Result<Vec<NewsItem>>;
}

pub struct YahooFinanceClient {
    client: Client,
    base_url: String,
    session_url: String,
    /// Session crumb for `quoteSummary`; cleared when Yahoo rejects it.
    crumb: RwLock<Option<String>>,
}

impl YahooFinanceClient {
    pub fn new() -> Result<Self> {
        Self::with_endpoints("https://query2.finance.yahoo.com", "https://fc.yahoo.com")
    }

    /// Client against explicit API and session-cookie hosts
    pub fn with_endpoints(
        base_url: impl Into<String>,
        session_url: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: super::build_http_client(true)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_url: session_url.into(),
            crumb: RwLock::new(None),
        })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<(StatusCode, String)> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                AnalystError::ToolError(format!("Yahoo Finance request failed for {}: {}", path, e))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AnalystError::ToolError(format!("Failed to read Yahoo Finance response: {}", e))
        })?;

        Ok((status, body))
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let (status, body) = self.get(path, query).await?;
        decode_response(path, status, &body)
    }

    /// Current session crumb, establishing a new session when none is held.
    async fn crumb(&self) -> Result<String> {
        if let Some(crumb) = self.crumb.read().await.as_ref() {
            return Ok(crumb.clone());
        }

        let mut slot = self.crumb.write().await;
        if let Some(crumb) = slot.as_ref() {
            return Ok(crumb.clone());
        }

        // Sets the session cookie; the page itself answers 404.
        let _ = self.client.get(&self.session_url).send().await;

        let crumb = self
            .client
            .get(format!("{}/v1/test/getcrumb", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let crumb = crumb.trim().to_string();
        if crumb.is_empty() || crumb.contains('<') || crumb.contains(' ') {
            return Err(AnalystError::ToolError(
                "Yahoo Finance did not issue a session crumb".to_string(),
            ));
        }

        info!("Yahoo Finance session established");
        *slot = Some(crumb.clone());
        Ok(crumb)
    }

    /// Drop `stale` so the next call starts a new session. A crumb that was
    /// already replaced by a concurrent caller is left alone.
    async fn invalidate_crumb(&self, stale: &str) {
        let mut slot = self.crumb.write().await;
        if slot.as_deref() == Some(stale) {
            *slot = None;
        }
    }

    async fn quote_summary(&self, symbol: &str, modules: &[&str]) -> Result<Value> {
        let crumb = self.crumb().await?;
        debug!(symbol, ?modules, "Yahoo quoteSummary");

        let path = format!("/v10/finance/quoteSummary/{}", symbol);
        let (status, body) = self
            .get(&path, &[("modules", modules.join(",")), ("crumb", crumb.clone())])
            .await?;

        if is_session_rejection(status, &body) {
            warn!(%status, "Yahoo Finance rejected the session crumb, resetting session");
            self.invalidate_crumb(&crumb).await;
        }

        parse_quote_summary(&decode_response(&path, status, &body)?)
    }

    async fn chart(&self, symbol: &str, range: &str) -> Result<Value> {
        debug!(symbol, range, "Yahoo chart");
        self.get_json(
            &format!("/v8/finance/chart/{}", symbol),
            &[("range", range.to_string()), ("interval", "1d".to_string())],
        )
        .await
    }
}

#[async_trait]
impl FinancialDataProvider for YahooFinanceClient {
    async fn current_price(&self, symbol: &str) -> Result<PriceQuote> {
        let body = self.chart(symbol, "5d").await?;
        parse_price_quote(&body)
    }

    async fn daily_closes(&self, symbol: &str) -> Result<Vec<f64>> {
        let body = self.chart(symbol, "6mo").await?;
        parse_daily_closes(&body)
    }

    async fn fundamentals(&self, symbol: &str) -> Result<Value> {
        self.quote_summary(symbol, &["summaryDetail", "defaultKeyStatistics", "financialData"])
            .await
    }

    async fn company_info(&self, symbol: &str) -> Result<Value> {
        self.quote_summary(symbol, &["assetProfile", "price"]).await
    }

    async fn analyst_recommendations(&self, symbol: &str) -> Result<Value> {
        self.quote_summary(symbol, &["recommendationTrend", "financialData"])
            .await
    }

    async fn financial_statements(&self, symbol: &str) -> Result<Value> {
        self.quote_summary(
            symbol,
            &[
                "incomeStatementHistory",
                "balanceSheetHistory",
                "cashflowStatementHistory",
            ],
        )
        .await
    }

    async fn company_news(&self, symbol: &str, count: usize) -> Result<Vec<NewsItem>> {
        let body = self
            .get_json(
                "/v1/finance/search",
                &[
                    ("q", symbol.to_string()),
                    ("newsCount", count.to_string()),
                    ("quotesCount", "0".to_string()),
                ],
            )
            .await?;

        Ok(parse_news(&body, count))
    }
}

// =============================
// Response parsing
// =============================

/// Status is checked before decoding so rate limits and HTML error pages
/// keep their status code.
fn decode_response(path: &str, status: StatusCode, body: &str) -> Result<Value> {
    if !status.is_success() {
        let detail = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|value| yahoo_error_description(&value))
            .unwrap_or_else(|| body.trim().chars().take(200).collect());

        return Err(AnalystError::ToolError(format!(
            "Yahoo Finance returned {} for {}: {}",
            status, path, detail
        )));
    }

    serde_json::from_str(body).map_err(|e| {
        AnalystError::ToolError(format!("Invalid JSON response from {}: {}", path, e))
    })
}

fn is_session_rejection(status: StatusCode, body: &str) -> bool {
    status == StatusCode::UNAUTHORIZED
        || (!status.is_success() && body.to_ascii_lowercase().contains("invalid crumb"))
}

fn yahoo_error_description(body: &Value) -> Option<String> {
    ["chart", "quoteSummary", "finance"]
        .iter()
        .filter_map(|root| body.get(*root)?.get("error"))
        .find(|error| !error.is_null())
        .map(|error| {
            error
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string())
        })
}

fn chart_result(body: &Value) -> Result<&Value> {
    if let Some(description) = yahoo_error_description(body) {
        return Err(AnalystError::ToolError(description));
    }

    body.get("chart")
        .and_then(|c| c.get("result"))
        .and_then(|r| r.get(0))
        .ok_or_else(|| AnalystError::ToolError("No chart data returned".to_string()))
}

pub(crate) fn parse_price_quote(body: &Value) -> Result<PriceQuote> {
    let meta = chart_result(body)?
        .get("meta")
        .ok_or_else(|| AnalystError::ToolError("Chart data has no metadata".to_string()))?;

    let number = |key: &str| meta.get(key).and_then(Value::as_f64);

    let price = number("regularMarketPrice")
        .ok_or_else(|| AnalystError::ToolError("No market price available".to_string()))?;
    let previous_close = number("previousClose").or_else(|| number("chartPreviousClose"));

    Ok(PriceQuote {
        symbol: meta
            .get("symbol")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        currency: meta.get("currency").and_then(Value::as_str).map(str::to_string),
        price,
        previous_close,
        change_percent: previous_close
            .filter(|prev| *prev != 0.0)
            .map(|prev| (price - prev) / prev * 100.0),
        day_high: number("regularMarketDayHigh"),
        day_low: number("regularMarketDayLow"),
        fifty_two_week_high: number("fiftyTwoWeekHigh"),
        fifty_two_week_low: number("fiftyTwoWeekLow"),
    })
}

pub(crate) fn parse_daily_closes(body: &Value) -> Result<Vec<f64>> {
    let closes = chart_result(body)?
        .get("indicators")
        .and_then(|i| i.get("quote"))
        .and_then(|q| q.get(0))
        .and_then(|q| q.get("close"))
        .and_then(Value::as_array)
        .ok_or_else(|| AnalystError::ToolError("Chart data has no closing prices".to_string()))?;

    // Holidays and halted sessions show up as nulls.
    Ok(closes.iter().filter_map(Value::as_f64).collect())
}

pub(crate) fn parse_quote_summary(body: &Value) -> Result<Value> {
    if let Some(description) = yahoo_error_description(body) {
        return Err(AnalystError::ToolError(description));
    }

    let result = body
        .get("quoteSummary")
        .and_then(|q| q.get("result"))
        .and_then(|r| r.get(0))
        .ok_or_else(|| AnalystError::ToolError("No quote summary returned".to_string()))?;

    Ok(flatten_values(result))
}

/// Replace Yahoo `{raw, fmt}` value objects with their formatted text and
/// drop empty ones, so the model sees "2.94T" instead of nested objects.
pub(crate) fn flatten_values(value: &Value) -> Value {
    match value {
        Value::Object(map) if map.contains_key("raw") || map.contains_key("fmt") => map
            .get("fmt")
            .filter(|v| !v.is_null())
            .or_else(|| map.get("raw"))
            .cloned()
            .unwrap_or(Value::Null),
        Value::Object(map) if map.is_empty() => Value::Null,
        Value::Object(map) => {
            let flattened: Map<String, Value> = map
                .iter()
                .filter(|(key, _)| key.as_str() != "maxAge")
                .map(|(key, v)| (key.clone(), flatten_values(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            Value::Object(flattened)
        }
        Value::Array(items) => Value::Array(items.iter().map(flatten_values).collect()),
        other => other.clone(),
    }
}

pub(crate) fn parse_news(body: &Value, count: usize) -> Vec<NewsItem> {
    body.get("news")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let title = item.get("title")?.as_str()?.to_string();
                    let link = item.get("link")?.as_str()?.to_string();
                    Some(NewsItem {
                        title,
                        publisher: item
                            .get("publisher")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        link,
                        published_at: item
                            .get("providerPublishTime")
                            .and_then(Value::as_i64)
                            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
                    })
                })
                .take(count)
                .collect()
        })
        .unwrap_or_default()
}
