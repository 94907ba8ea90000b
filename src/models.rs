//! Core data models shared by tools, agents and the API

use serde::{Deserialize, Serialize};
use uuid::Uuid;

//
// ================= Tool I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: serde_json::Value,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

//
// ================= Agent Runs =================
//

/// A tool invocation made during an agent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub success: bool,
    pub elapsed_ms: u64,
}

/// Result of one agent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    pub run_id: Uuid,
    pub agent: String,
    pub content: String,
    pub tool_calls: Vec<ToolCallRecord>,
}
