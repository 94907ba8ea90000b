//! Capability providers
//!
//! Thin HTTP clients for the external data sources the agents rely on.
//! Each source sits behind a trait so tools can be exercised with stubs.

pub mod finance;
pub mod indicators;
pub mod search;

pub use finance::{FinancialDataProvider, NewsItem, PriceQuote, YahooFinanceClient};
pub use search::{DuckDuckGoClient, NewsHit, SearchHit, WebSearchProvider};

use crate::error::AnalystError;
use crate::Result;
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// Shared HTTP client settings for provider calls
pub(crate) fn build_http_client(cookies: bool) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(8)
        .timeout(Duration::from_secs(30))
        .cookie_store(cookies)
        .build()
        .map_err(|e| {
            AnalystError::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })
}

/// Serve a router on an ephemeral local port and return its base URL
#[cfg(test)]
pub(crate) async fn serve_mock(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
