//! AI Stock Analyst
//!
//! A team of LLM-driven agents that answers stock questions:
//! - a web search agent for news and general information
//! - a finance agent for prices, fundamentals, statements and indicators
//! - a coordinating team leader that delegates to both and merges the answers
//!
//! CONVERSATION LOOP:
//! TRANSCRIPT + INPUT → COMPOSITE QUERY → TEAM → (MEMBER → TOOLS)* → ANSWER → TRANSCRIPT
//!
//! Two HTTP surfaces sit on top: a chat page backed by the conversation
//! orchestrator, and a playground that runs one capability agent directly.

pub mod agents;
pub mod api;
pub mod config;
pub mod conversation;
pub mod error;
pub mod gemini;
pub mod llm;
pub mod models;
pub mod providers;
pub mod tools;

pub use error::{AnalystError, Result};

// Re-export common types
pub use conversation::{ConversationOrchestrator, Role, Transcript, Turn};
pub use models::*;
