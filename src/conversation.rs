//! Conversation state and the orchestrator that drives it
//!
//! The transcript is owned by the caller (a browser session, a test, a REPL)
//! and handed to [`ConversationOrchestrator::submit`] on every turn. The
//! orchestrator itself keeps no session state.

use crate::agents::Coordinator;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Instruction wrapped around the conversation context on every submission
pub const QUERY_TEMPLATE: &str = "Identify relevant stocks and provide comprehensive financial insights based on the following request and context: ";

/// Role of a turn's author
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.content)
    }
}

/// Ordered, append-only user/assistant history for one session
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// "Role: text" lines in chronological order
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(Turn::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Composite query for a new user message: every prior turn plus the
    /// new one, wrapped in [`QUERY_TEMPLATE`].
    pub fn compose_query(&self, user_text: &str) -> String {
        let mut context = self.render();
        if !context.is_empty() {
            context.push('\n');
        }
        context.push_str(&Turn::user(user_text).to_string());

        format!("{}{}", QUERY_TEMPLATE, context)
    }
}

impl From<Vec<Turn>> for Transcript {
    fn from(turns: Vec<Turn>) -> Self {
        Self { turns }
    }
}

/// Combines history with new input, asks the coordinator, records the answer
pub struct ConversationOrchestrator {
    coordinator: Arc<dyn Coordinator>,
}

impl ConversationOrchestrator {
    pub fn new(coordinator: Arc<dyn Coordinator>) -> Self {
        Self { coordinator }
    }

    /// Submit one user message and return the updated display text.
    ///
    /// Blank input is ignored. The transcript grows by exactly one user and
    /// one assistant turn on success, and is left untouched on failure.
    pub async fn submit(&self, transcript: &mut Transcript, user_text: &str) -> Result<String> {
        if user_text.trim().is_empty() {
            return Ok(transcript.render());
        }

        let query = transcript.compose_query(user_text);
        info!(
            prior_turns = transcript.len(),
            query_chars = query.len(),
            "Submitting conversation turn"
        );

        let reply = self.coordinator.coordinate(&query).await.map_err(|e| {
            warn!("Coordinator call failed: {}", e);
            e
        })?;

        transcript.push(Turn::user(user_text));
        transcript.push(Turn::assistant(reply.content));

        Ok(transcript.render())
    }
}
