//! Chat model abstraction
//!
//! Agents talk to the language model through [`ChatModel`] so that the
//! Gemini client can be swapped for a scripted model in tests.

use crate::error::AnalystError;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Who produced a message in a model exchange
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    User,
    Model,
}

/// A function the model asked us to call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// The result of a function call, sent back to the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessagePart {
    Text(String),
    Call(FunctionCall),
    Response(FunctionResponse),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelMessage {
    pub role: ModelRole,
    pub parts: Vec<MessagePart>,
}

impl ModelMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ModelRole::User,
            parts: vec![MessagePart::Text(text.into())],
        }
    }

    /// Echo of a model turn that requested function calls
    pub fn model_turn(text: Option<String>, calls: Vec<FunctionCall>) -> Self {
        let mut parts: Vec<MessagePart> = text.into_iter().map(MessagePart::Text).collect();
        parts.extend(calls.into_iter().map(MessagePart::Call));

        Self {
            role: ModelRole::Model,
            parts,
        }
    }

    pub fn function_responses(responses: Vec<FunctionResponse>) -> Self {
        Self {
            role: ModelRole::User,
            parts: responses.into_iter().map(MessagePart::Response).collect(),
        }
    }
}

/// Declaration of a callable function (JSON schema parameters)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_instruction: String,
    pub messages: Vec<ModelMessage>,
    pub functions: Vec<FunctionDeclaration>,
}

/// One model turn: free text, function calls, or both
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: Option<String>,
    pub function_calls: Vec<FunctionCall>,
    pub finish_reason: Option<String>,
}

impl ModelReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            function_calls: Vec::new(),
            finish_reason: Some("STOP".to_string()),
        }
    }

    pub fn calls(calls: Vec<FunctionCall>) -> Self {
        Self {
            text: None,
            function_calls: calls,
            finish_reason: Some("STOP".to_string()),
        }
    }
}

/// Trait for language model backends
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_id(&self) -> &str;
    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply>;
}

/// Scripted model for development & testing.
/// Replays queued replies in order and records every request it sees.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelReply>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<ModelReply>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let next = self
            .replies
            .lock()
            .map_err(|_| AnalystError::LlmError("scripted model poisoned".to_string()))?
            .pop_front();

        next.unwrap_or_else(|| {
            Err(AnalystError::LlmError(
                "scripted model has no more replies".to_string(),
            ))
        })
    }
}
