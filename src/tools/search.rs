use super::{ensure_object_parameters, optional_count, require_str, Tool, ToolKind};
use crate::error::AnalystError;
use crate::models::{ToolInput, ToolOutput};
use crate::providers::WebSearchProvider;
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;

const DEFAULT_MAX_RESULTS: usize = 5;
const MAX_RESULTS_LIMIT: usize = 20;

/// DuckDuckGo web and news search
pub struct WebSearchTool {
    kind: ToolKind,
    provider: Arc<dyn WebSearchProvider>,
}

impl WebSearchTool {
    /// `kind` must be `DuckDuckGoSearch` or `DuckDuckGoNews`.
    pub fn new(kind: ToolKind, provider: Arc<dyn WebSearchProvider>) -> Self {
        Self { kind, provider }
    }
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        self.kind.function_name()
    }

    fn description(&self) -> &str {
        match self.kind {
            ToolKind::DuckDuckGoNews => {
                "Search recent news with DuckDuckGo. Returns headlines, links, sources and publication dates."
            }
            _ => {
                "Search the web with DuckDuckGo. Returns titles, links and snippets for the query."
            }
        }
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query"},
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let query = require_str(input, "query")?;
        let max_results =
            optional_count(input, "max_results", DEFAULT_MAX_RESULTS, MAX_RESULTS_LIMIT);

        let results = match self.kind {
            ToolKind::DuckDuckGoSearch => {
                serde_json::to_value(self.provider.search(query, max_results).await?)?
            }
            ToolKind::DuckDuckGoNews => {
                serde_json::to_value(self.provider.news(query, max_results).await?)?
            }
            other => {
                return Err(AnalystError::ToolNotFound(format!(
                    "{} is not a web search tool",
                    other.function_name()
                )))
            }
        };

        Ok(ToolOutput::ok(json!({
            "query": query,
            "results": results,
        })))
    }
}
