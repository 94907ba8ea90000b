//! Capability agents and the coordinating team
//!
//! A capability agent answers a natural-language request using one external
//! capability (web search or market data). The coordinator routes a request
//! across capability agents and merges their answers.

pub mod presets;
pub mod runner;
pub mod team;

pub use presets::{coordinator, finance_agent, web_search_agent, FinanceToolSet, GREETING};
pub use runner::ToolAgent;
pub use team::{DelegateTool, TeamCoordinator};

use crate::models::AgentReply;
use crate::tools::ToolKind;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Static configuration of an agent, built once at startup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentDescriptor {
    pub id: String,
    pub name: String,
    pub role: Option<String>,
    pub instructions: Vec<String>,
    pub tools: Vec<ToolKind>,
    pub show_tool_calls: bool,
    pub markdown: bool,
}

impl AgentDescriptor {
    /// System prompt derived from the descriptor
    pub fn system_instruction(&self) -> String {
        let mut prompt = format!("You are {}.", self.name);

        if let Some(role) = &self.role {
            prompt.push_str(&format!("\nYour role is: {}", role));
        }

        if !self.instructions.is_empty() || self.markdown {
            prompt.push_str("\n\n## Instructions\n");
            for instruction in &self.instructions {
                prompt.push_str(instruction);
                prompt.push('\n');
            }
            if self.markdown {
                prompt.push_str("Use markdown to format your answers.\n");
            }
        }

        prompt
    }
}

/// Turn a display name into a stable identifier: "Web Search Agent" -> "web_search_agent"
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

/// Uniform "answer a natural-language request" contract
#[async_trait]
pub trait CapabilityAgent: Send + Sync {
    fn descriptor(&self) -> &AgentDescriptor;
    async fn answer(&self, request: &str) -> Result<AgentReply>;
}

/// Routes a composite query across capability agents
#[async_trait]
pub trait Coordinator: Send + Sync {
    async fn coordinate(&self, query: &str) -> Result<AgentReply>;
}
