//! Gemini API client
//!
//! Implements [`ChatModel`] on top of `generateContent`, including function
//! calling. Uses a long-lived reqwest::Client for connection pooling.

use crate::error::AnalystError;
use crate::llm::{
    ChatModel, FunctionCall, FunctionDeclaration, FunctionResponse, MessagePart, ModelMessage,
    ModelReply, ModelRequest, ModelRole,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model_id: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model_id: String, base_url: String) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model_id,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model_id)
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn complete(&self, request: &ModelRequest) -> crate::Result<ModelReply> {
        let body = GeminiRequest::from_model_request(request);

        debug!(
            model = %self.model_id,
            messages = request.messages.len(),
            functions = request.functions.len(),
            "Calling Gemini API"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AnalystError::UpstreamError(format!("Gemini API request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(AnalystError::LlmError(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AnalystError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        let reply = gemini_response.into_reply()?;

        info!(
            model = %self.model_id,
            function_calls = reply.function_calls.len(),
            finish_reason = ?reply.finish_reason,
            "Gemini response received"
        );

        Ok(reply)
    }
}

// =============================
// Wire format
// =============================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    system_instruction: SystemInstruction,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDeclarations>,
    generation_config: GenerationConfig,
}

impl GeminiRequest {
    fn from_model_request(request: &ModelRequest) -> Self {
        let contents = request.messages.iter().map(Content::from).collect();

        let tools = if request.functions.is_empty() {
            Vec::new()
        } else {
            vec![ToolDeclarations {
                function_declarations: request.functions.clone(),
            }]
        };

        Self {
            contents,
            system_instruction: SystemInstruction {
                parts: vec![Part::text(request.system_instruction.clone())],
            },
            tools,
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 4096,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl From<&ModelMessage> for Content {
    fn from(message: &ModelMessage) -> Self {
        let role = match message.role {
            ModelRole::User => "user",
            ModelRole::Model => "model",
        };

        let parts = message
            .parts
            .iter()
            .map(|part| match part {
                MessagePart::Text(text) => Part::text(text.clone()),
                MessagePart::Call(call) => Part {
                    function_call: Some(call.clone()),
                    ..Part::default()
                },
                MessagePart::Response(response) => Part {
                    function_response: Some(response.clone()),
                    ..Part::default()
                },
            })
            .collect();

        Self {
            role: Some(role.to_string()),
            parts,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclarations {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiResponse {
    fn into_reply(self) -> crate::Result<ModelReply> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);

        let candidate = self.candidates.into_iter().next().ok_or_else(|| {
            AnalystError::LlmError(match block_reason {
                Some(reason) => format!("Gemini blocked the prompt: {}", reason),
                None => "No response from Gemini API".to_string(),
            })
        })?;

        let mut texts = Vec::new();
        let mut function_calls = Vec::new();

        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(text) = part.text {
                texts.push(text);
            }
            if let Some(call) = part.function_call {
                function_calls.push(call);
            }
        }

        let text = Some(texts.concat()).filter(|t| !t.trim().is_empty());

        if text.is_none() && function_calls.is_empty() {
            return Err(AnalystError::LlmError(format!(
                "Empty response from Gemini (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(ModelReply {
            text,
            function_calls,
            finish_reason: candidate.finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = ModelRequest {
            system_instruction: "You are a financial analyst".to_string(),
            messages: vec![
                ModelMessage::user("What is RSI?"),
                ModelMessage::model_turn(
                    None,
                    vec![FunctionCall {
                        name: "get_technical_indicators".into(),
                        args: json!({"symbol": "AAPL"}),
                    }],
                ),
                ModelMessage::function_responses(vec![FunctionResponse {
                    name: "get_technical_indicators".into(),
                    response: json!({"result": {"rsi_14": 55.2}}),
                }]),
            ],
            functions: vec![FunctionDeclaration {
                name: "get_technical_indicators".into(),
                description: "Indicators".into(),
                parameters: json!({"type": "object"}),
            }],
        };

        let value = serde_json::to_value(GeminiRequest::from_model_request(&request)).unwrap();

        assert_eq!(value["contents"][0]["parts"][0]["text"], "What is RSI?");
        assert_eq!(value["contents"][1]["role"], "model");
        assert_eq!(
            value["contents"][1]["parts"][0]["functionCall"]["name"],
            "get_technical_indicators"
        );
        assert_eq!(
            value["contents"][2]["parts"][0]["functionResponse"]["response"]["result"]["rsi_14"],
            55.2
        );
        assert_eq!(
            value["tools"][0]["functionDeclarations"][0]["name"],
            "get_technical_indicators"
        );
        assert_eq!(
            value["systemInstruction"]["parts"][0]["text"],
            "You are a financial analyst"
        );
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 4096);
    }

    #[test]
    fn test_request_without_functions_omits_tools() {
        let request = ModelRequest {
            system_instruction: String::new(),
            messages: vec![ModelMessage::user("hello")],
            functions: vec![],
        };
        let value = serde_json::to_value(GeminiRequest::from_model_request(&request)).unwrap();
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn test_response_with_function_call() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{
                        "functionCall": {"name": "duckduckgo_search", "args": {"query": "NVDA"}}
                    }]
                },
                "finishReason": "STOP"
            }]
        });

        let response: GeminiResponse = serde_json::from_value(raw).unwrap();
        let reply = response.into_reply().unwrap();

        assert!(reply.text.is_none());
        assert_eq!(reply.function_calls[0].name, "duckduckgo_search");
        assert_eq!(reply.function_calls[0].args["query"], "NVDA");
        assert_eq!(reply.finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn test_response_text_parts_are_joined() {
        let raw = json!({
            "candidates": [{
                "content": {"parts": [{"text": "## Stock Analysis\n"}, {"text": "| a | b |"}]},
                "finishReason": "STOP"
            }]
        });

        let response: GeminiResponse = serde_json::from_value(raw).unwrap();
        let reply = response.into_reply().unwrap();
        assert_eq!(reply.text.as_deref(), Some("## Stock Analysis\n| a | b |"));
    }

    #[test]
    fn test_blocked_and_empty_responses_are_errors() {
        let blocked: GeminiResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        let err = blocked.into_reply().unwrap_err();
        assert!(err.to_string().contains("SAFETY"));

        let empty: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "MAX_TOKENS"}]
        }))
        .unwrap();
        let err = empty.into_reply().unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }
}
