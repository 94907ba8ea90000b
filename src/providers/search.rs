//! Web search provider backed by DuckDuckGo
//!
//! Web results are scraped from the HTML endpoint. Headlines come from the
//! `news.js` endpoint, which needs the per-query `vqd` token embedded in the
//! regular search page.

use crate::error::AnalystError;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsHit {
    pub title: String,
    pub url: String,
    pub source: Option<String>,
    pub excerpt: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
    async fn news(&self, query: &str, max_results: usize) -> Result<Vec<NewsHit>>;
}

/// Compiled patterns for DuckDuckGo pages
pub(crate) struct ResultPatterns {
    title: Regex,
    snippet: Regex,
    tag: Regex,
    vqd: Regex,
}

impl ResultPatterns {
    pub(crate) fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                AnalystError::ConfigurationError(format!("Invalid result pattern: {}", e))
            })
        };

        Ok(Self {
            title: compile(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)?,
            snippet: compile(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#)?,
            tag: compile(r"<[^>]+>")?,
            vqd: compile(r#"vqd=["']?([0-9-]+)"#)?,
        })
    }

    /// Strip markup, decode entities and collapse whitespace
    fn clean(&self, fragment: &str) -> String {
        let text = decode_entities(&self.tag.replace_all(fragment, ""));
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

pub struct DuckDuckGoClient {
    client: Client,
    html_url: String,
    site_url: String,
    patterns: ResultPatterns,
}

impl DuckDuckGoClient {
    pub fn new() -> Result<Self> {
        Self::with_endpoints("https://html.duckduckgo.com/html/", "https://duckduckgo.com")
    }

    /// Client against explicit HTML-results and main-site hosts
    pub fn with_endpoints(
        html_url: impl Into<String>,
        site_url: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: super::build_http_client(false)?,
            html_url: html_url.into(),
            site_url: site_url.into().trim_end_matches('/').to_string(),
            patterns: ResultPatterns::new()?,
        })
    }

    async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| AnalystError::ToolError(format!("DuckDuckGo request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalystError::ToolError(format!(
                "DuckDuckGo returned {}",
                status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| {
                AnalystError::ToolError(format!("Failed to read DuckDuckGo response: {}", e))
            })
    }
}

#[async_trait]
impl WebSearchProvider for DuckDuckGoClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        debug!(query, max_results, "DuckDuckGo search");

        let html = self.get_text(&self.html_url, &[("q", query)]).await?;
        Ok(parse_html_results(&html, max_results, &self.patterns))
    }

    async fn news(&self, query: &str, max_results: usize) -> Result<Vec<NewsHit>> {
        debug!(query, max_results, "DuckDuckGo news");

        let page = self
            .get_text(&format!("{}/", self.site_url), &[("q", query)])
            .await?;
        let vqd = extract_vqd(&page, &self.patterns).ok_or_else(|| {
            AnalystError::ToolError("DuckDuckGo did not return a search token".to_string())
        })?;

        let body = self
            .get_text(
                &format!("{}/news.js", self.site_url),
                &[
                    ("l", "wt-wt"),
                    ("o", "json"),
                    ("noamp", "1"),
                    ("q", query),
                    ("vqd", vqd.as_str()),
                    ("p", "-1"),
                ],
            )
            .await?;

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            AnalystError::ToolError(format!("Invalid DuckDuckGo news response: {}", e))
        })?;

        Ok(parse_news(&value, max_results, &self.patterns))
    }
}

// =============================
// Response parsing
// =============================

/// Organic results from the HTML endpoint, in page order. Ads are skipped.
pub(crate) fn parse_html_results(
    html: &str,
    max_results: usize,
    patterns: &ResultPatterns,
) -> Vec<SearchHit> {
    let titles: Vec<(usize, usize, &str, &str)> = patterns
        .title
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((whole.start(), whole.end(), caps.get(1)?.as_str(), caps.get(2)?.as_str()))
        })
        .collect();

    let mut hits = Vec::new();
    for (i, (_, end, href, raw_title)) in titles.iter().enumerate() {
        if hits.len() == max_results {
            break;
        }

        let Some(url) = resolve_result_url(href) else {
            continue;
        };
        let title = patterns.clean(raw_title);
        if title.is_empty() {
            continue;
        }

        // The snippet belongs to this result if it appears before the next title.
        let block_end = titles.get(i + 1).map(|next| next.0).unwrap_or(html.len());
        let snippet = patterns
            .snippet
            .captures(&html[*end..block_end])
            .and_then(|caps| caps.get(1))
            .map(|m| patterns.clean(m.as_str()))
            .unwrap_or_default();

        hits.push(SearchHit {
            title,
            url,
            snippet,
        });
    }

    hits
}

/// Result links go through a `/l/?uddg=<target>` redirect; ads through `y.js`.
fn resolve_result_url(href: &str) -> Option<String> {
    let href = decode_entities(href);

    let url = match href.find("uddg=") {
        Some(pos) => {
            let encoded = href[pos + "uddg=".len()..].split('&').next().unwrap_or_default();
            urlencoding::decode(encoded).ok()?.into_owned()
        }
        None => match href.strip_prefix("//") {
            Some(rest) => format!("https://{}", rest),
            None => href,
        },
    };

    if url.starts_with("http") && !url.contains("duckduckgo.com/y.js") {
        Some(url)
    } else {
        None
    }
}

pub(crate) fn extract_vqd(page: &str, patterns: &ResultPatterns) -> Option<String> {
    patterns
        .vqd
        .captures(page)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub(crate) fn parse_news(
    value: &Value,
    max_results: usize,
    patterns: &ResultPatterns,
) -> Vec<NewsHit> {
    value
        .get("results")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let title = patterns.clean(item.get("title")?.as_str()?);
                    let url = item.get("url")?.as_str()?.trim().to_string();
                    if title.is_empty() || url.is_empty() {
                        return None;
                    }

                    Some(NewsHit {
                        title,
                        url,
                        source: item
                            .get("source")
                            .and_then(Value::as_str)
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string),
                        excerpt: item
                            .get("excerpt")
                            .and_then(Value::as_str)
                            .map(|e| patterns.clean(e))
                            .unwrap_or_default(),
                        published_at: item
                            .get("date")
                            .and_then(Value::as_i64)
                            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
                    })
                })
                .take(max_results)
                .collect()
        })
        .unwrap_or_default()
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::serve_mock;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    const RESULTS_PAGE: &str = include_str!("testdata/duckduckgo_results.html");
    const NEWS_PAYLOAD: &str = include_str!("testdata/duckduckgo_news.json");

    fn patterns() -> ResultPatterns {
        ResultPatterns::new().unwrap()
    }

    #[test]
    fn test_parse_html_results() {
        let hits = parse_html_results(RESULTS_PAGE, 10, &patterns());

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "NVIDIA Stock Price Today | NVDA Live - Investing.com");
        assert_eq!(hits[0].url, "https://www.investing.com/equities/nvidia-corp");
        assert_eq!(
            hits[0].snippet,
            "Get the latest NVIDIA Corporation (NVDA) real-time quote & news."
        );
        assert_eq!(hits[1].title, "Nvidia's earnings: what to expect");
        assert_eq!(
            hits[1].url,
            "https://www.reuters.com/technology/nvidia-earnings-preview-2024?ref=ddg&x=1"
        );
        // The third result has no snippet on the page.
        assert_eq!(hits[2].url, "https://nvidianews.nvidia.com/");
        assert!(hits[2].snippet.is_empty());
    }

    #[test]
    fn test_parse_html_results_skips_ads_and_respects_limit() {
        let hits = parse_html_results(RESULTS_PAGE, 10, &patterns());
        assert!(hits.iter().all(|hit| !hit.url.contains("y.js")));

        let limited = parse_html_results(RESULTS_PAGE, 1, &patterns());
        assert_eq!(limited.len(), 1);

        assert!(parse_html_results("<html>No results.</html>", 5, &patterns()).is_empty());
    }

    #[test]
    fn test_parse_news() {
        let value: Value = serde_json::from_str(NEWS_PAYLOAD).unwrap();
        let news = parse_news(&value, 10, &patterns());

        assert_eq!(news.len(), 2);
        assert_eq!(news[0].title, "Nvidia shares hit record as AI demand surges");
        assert_eq!(news[0].source.as_deref(), Some("Reuters"));
        assert_eq!(
            news[0].excerpt,
            "Nvidia stock climbed 4% on Tuesday after analysts raised targets."
        );
        assert_eq!(
            news[0].published_at.map(|t| t.timestamp()),
            Some(1_718_000_000)
        );
        assert!(news[1].source.is_none());
        assert!(news[1].published_at.is_none());

        assert_eq!(parse_news(&value, 1, &patterns()).len(), 1);
        assert!(parse_news(&serde_json::json!({}), 3, &patterns()).is_empty());
    }

    #[test]
    fn test_extract_vqd() {
        let patterns = patterns();
        let page = r#"<script>DDG.deep.initialize('/d.js?q=nvda&vqd="4-123456789"');</script>"#;
        assert_eq!(
            extract_vqd(page, &patterns).as_deref(),
            Some("4-123456789")
        );
        assert_eq!(
            extract_vqd("...&vqd=4-987654&kl=wt-wt...", &patterns).as_deref(),
            Some("4-987654")
        );
        assert!(extract_vqd("<html></html>", &patterns).is_none());
    }

    #[test]
    fn test_resolve_result_url() {
        let redirect = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fa%3Fb%3D1&amp;rut=abc";
        assert_eq!(
            resolve_result_url(redirect).as_deref(),
            Some("https://example.com/a?b=1")
        );
        assert_eq!(
            resolve_result_url("https://example.com/direct").as_deref(),
            Some("https://example.com/direct")
        );
        assert!(resolve_result_url("https://duckduckgo.com/y.js?ad_domain=example.com").is_none());
        assert!(resolve_result_url("/relative").is_none());
    }

    async fn search_page(Query(params): Query<HashMap<String, String>>) -> (StatusCode, String) {
        match params.get("q").map(String::as_str) {
            Some("NVDA") => (StatusCode::OK, RESULTS_PAGE.to_string()),
            _ => (StatusCode::BAD_REQUEST, String::new()),
        }
    }

    async fn landing_page() -> String {
        r#"<html><script>vqd="4-55555"</script></html>"#.to_string()
    }

    async fn news_endpoint(Query(params): Query<HashMap<String, String>>) -> (StatusCode, String) {
        if params.get("vqd").map(String::as_str) == Some("4-55555") {
            (StatusCode::OK, NEWS_PAYLOAD.to_string())
        } else {
            (StatusCode::FORBIDDEN, String::new())
        }
    }

    async fn mock_client() -> DuckDuckGoClient {
        let router = Router::new()
            .route("/html/", get(search_page))
            .route("/", get(landing_page))
            .route("/news.js", get(news_endpoint));
        let base = serve_mock(router).await;
        DuckDuckGoClient::with_endpoints(format!("{}/html/", base), base).unwrap()
    }

    #[tokio::test]
    async fn test_client_search_and_news() {
        let client = mock_client().await;

        let hits = assert_ok!(client.search("NVDA", 2).await);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://www.investing.com/equities/nvidia-corp");

        let news = assert_ok!(client.news("NVDA", 5).await);
        assert_eq!(news.len(), 2);
        assert_eq!(news[0].source.as_deref(), Some("Reuters"));
    }

    #[tokio::test]
    async fn test_client_reports_http_errors() {
        let client = mock_client().await;
        let err = assert_err!(client.search("other", 2).await);
        assert!(err.to_string().contains("400"));
    }
}
