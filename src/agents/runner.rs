//! Model-driven tool loop shared by every agent
//!
//! REQUEST → MODEL → (CALL TOOLS → MODEL)* → ANSWER

use super::{AgentDescriptor, CapabilityAgent};
use crate::error::AnalystError;
use crate::llm::{ChatModel, FunctionCall, FunctionResponse, ModelMessage, ModelRequest};
use crate::models::{AgentReply, ToolCallRecord};
use crate::tools::{build_registry, Providers, ToolRegistry};
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct ToolAgent {
    descriptor: AgentDescriptor,
    system_instruction: String,
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    max_tool_rounds: usize,
}

impl ToolAgent {
    /// Agent whose tools are the descriptor's tool kinds
    pub fn new(
        descriptor: AgentDescriptor,
        model: Arc<dyn ChatModel>,
        providers: &Providers,
        max_tool_rounds: usize,
    ) -> Self {
        let tools = build_registry(&descriptor.tools, providers);
        let system_instruction = descriptor.system_instruction();
        Self::with_registry(descriptor, system_instruction, model, tools, max_tool_rounds)
    }

    pub fn with_registry(
        descriptor: AgentDescriptor,
        system_instruction: String,
        model: Arc<dyn ChatModel>,
        tools: ToolRegistry,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            descriptor,
            system_instruction,
            model,
            tools,
            max_tool_rounds,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run the request to completion
    pub async fn run(&self, request: &str) -> Result<AgentReply> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();

        info!(
            %run_id,
            agent = %self.descriptor.name,
            model = %self.model.model_id(),
            "Agent run started"
        );

        let mut model_request = ModelRequest {
            system_instruction: self.system_instruction.clone(),
            messages: vec![ModelMessage::user(request)],
            functions: self.tools.declarations(),
        };
        let mut tool_calls = Vec::new();
        let mut rounds = 0;

        let answer = loop {
            let reply = self.model.complete(&model_request).await?;

            if reply.function_calls.is_empty() {
                break reply.text.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
                    AnalystError::LlmError(format!(
                        "{} returned an empty answer",
                        self.descriptor.name
                    ))
                })?;
            }

            if rounds == self.max_tool_rounds {
                warn!(%run_id, agent = %self.descriptor.name, rounds, "Tool round limit reached");
                return Err(AnalystError::MaxToolRoundsExceeded(self.max_tool_rounds));
            }
            rounds += 1;

            let mut responses = Vec::with_capacity(reply.function_calls.len());
            for call in &reply.function_calls {
                let (response, record) = self.call_tool(run_id, call).await;
                responses.push(response);
                tool_calls.push(record);
            }

            model_request
                .messages
                .push(ModelMessage::model_turn(reply.text, reply.function_calls));
            model_request
                .messages
                .push(ModelMessage::function_responses(responses));
        };

        info!(
            %run_id,
            agent = %self.descriptor.name,
            tool_calls = tool_calls.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Agent run completed"
        );

        let content = if self.descriptor.show_tool_calls && !tool_calls.is_empty() {
            format!("{}\n\n{}", render_tool_calls(&tool_calls), answer)
        } else {
            answer
        };

        Ok(AgentReply {
            run_id,
            agent: self.descriptor.name.clone(),
            content,
            tool_calls,
        })
    }

    /// Execute one call. Failures go back to the model as an `error` field
    /// instead of aborting the run.
    async fn call_tool(
        &self,
        run_id: Uuid,
        call: &FunctionCall,
    ) -> (FunctionResponse, ToolCallRecord) {
        let started = Instant::now();
        debug!(%run_id, tool = %call.name, args = %call.args, "Executing tool");

        let (response, success) = match self.tools.execute(call).await {
            Ok(output) if output.success => (json!({ "result": output.data }), true),
            Ok(output) => {
                let message = output
                    .error
                    .unwrap_or_else(|| "tool reported failure".to_string());
                (json!({ "error": message }), false)
            }
            Err(e) => {
                warn!(%run_id, tool = %call.name, "Tool call failed: {}", e);
                (json!({ "error": e.to_string() }), false)
            }
        };

        let record = ToolCallRecord {
            tool_name: call.name.clone(),
            arguments: call.args.clone(),
            success,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        (
            FunctionResponse {
                name: call.name.clone(),
                response,
            },
            record,
        )
    }
}

#[async_trait]
impl CapabilityAgent for ToolAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn answer(&self, request: &str) -> Result<AgentReply> {
        self.run(request).await
    }
}

/// " - Running: get_current_stock_price(symbol=NVDA)" lines
fn render_tool_calls(calls: &[ToolCallRecord]) -> String {
    let mut out = String::new();
    for call in calls {
        let args = match &call.arguments {
            Value::Object(map) => {
                let mut pairs: Vec<String> = map
                    .iter()
                    .map(|(key, value)| match value {
                        Value::String(s) => format!("{}={}", key, s),
                        other => format!("{}={}", key, other),
                    })
                    .collect();
                pairs.sort();
                pairs.join(", ")
            }
            Value::Null => String::new(),
            other => other.to_string(),
        };
        out.push_str(&format!(" - Running: {}({})\n", call.tool_name, args));
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{finance_agent, web_search_agent, FinanceToolSet};
    use crate::llm::{MessagePart, ModelReply, ModelRole, ScriptedModel};
    use crate::tools::testing::stub_providers;
    use tokio_test::{assert_err, assert_ok};

    fn call(name: &str, args: Value) -> FunctionCall {
        FunctionCall {
            name: name.to_string(),
            args,
        }
    }

    fn agent(model: Arc<ScriptedModel>, max_rounds: usize) -> ToolAgent {
        ToolAgent::new(
            finance_agent(FinanceToolSet::standard()),
            model,
            &stub_providers(),
            max_rounds,
        )
    }

    #[tokio::test]
    async fn test_text_answer_without_tools() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(ModelReply::text("AAPL looks fine."))]));
        let reply = assert_ok!(agent(model.clone(), 4).run("Tell me about AAPL").await);

        assert_eq!(reply.content, "AAPL looks fine.");
        assert_eq!(reply.agent, "Finance AI Agent");
        assert!(reply.tool_calls.is_empty());

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].system_instruction.contains("Use tables"));
        assert_eq!(requests[0].functions.len(), 4);
    }

    #[tokio::test]
    async fn test_tool_results_are_fed_back() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelReply::calls(vec![call(
                "get_current_stock_price",
                json!({"symbol": "NVDA"}),
            )])),
            Ok(ModelReply::text("| Symbol | Price |\n|---|---|\n| NVDA | 123.45 |")),
        ]));

        let reply = assert_ok!(agent(model.clone(), 4).run("NVDA price?").await);

        assert_eq!(reply.tool_calls.len(), 1);
        assert!(reply.tool_calls[0].success);
        assert!(reply
            .content
            .starts_with(" - Running: get_current_stock_price(symbol=NVDA)\n\n"));
        assert!(reply.content.ends_with("| NVDA | 123.45 |"));

        let requests = model.requests();
        let second = &requests[1].messages;
        assert_eq!(second.len(), 3);
        assert_eq!(second[1].role, ModelRole::Model);
        match &second[2].parts[0] {
            MessagePart::Response(response) => {
                assert_eq!(response.name, "get_current_stock_price");
                assert_eq!(response.response["result"]["data"]["price"], 123.45);
            }
            other => panic!("expected function response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tool_failure_is_reported_to_model() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelReply::calls(vec![
                call("get_current_stock_price", json!({"symbol": "FAIL"})),
                call("unknown_tool", json!({})),
            ])),
            Ok(ModelReply::text("Data is unavailable for FAIL.")),
        ]));

        let reply = assert_ok!(agent(model.clone(), 4).run("FAIL price?").await);
        assert_eq!(reply.tool_calls.len(), 2);
        assert!(reply.tool_calls.iter().all(|c| !c.success));

        let requests = model.requests();
        match &requests[1].messages[2].parts[1] {
            MessagePart::Response(response) => {
                assert!(response.response["error"]
                    .as_str()
                    .unwrap()
                    .contains("unknown_tool"));
            }
            other => panic!("expected function response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_round_limit() {
        let looping = || {
            Ok(ModelReply::calls(vec![call(
                "get_current_stock_price",
                json!({"symbol": "AAPL"}),
            )]))
        };
        let model = Arc::new(ScriptedModel::new(vec![looping(), looping(), looping()]));

        let err = assert_err!(agent(model.clone(), 2).run("loop").await);
        assert!(matches!(err, AnalystError::MaxToolRoundsExceeded(2)));
        assert_eq!(model.request_count(), 3);
    }

    #[tokio::test]
    async fn test_model_error_aborts_run() {
        let model = Arc::new(ScriptedModel::new(vec![Err(AnalystError::LlmError(
            "quota exceeded".into(),
        ))]));
        let err = assert_err!(agent(model, 2).run("anything").await);
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_empty_answer_is_an_error() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(ModelReply::default())]));
        let err = assert_err!(agent(model, 2).run("anything").await);
        assert!(matches!(err, AnalystError::LlmError(_)));
    }

    #[tokio::test]
    async fn test_hidden_tool_calls() {
        let mut descriptor = web_search_agent();
        descriptor.show_tool_calls = false;

        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelReply::calls(vec![call("duckduckgo_search", json!({"query": "AAPL"}))])),
            Ok(ModelReply::text("Apple news summary")),
        ]));
        let agent = ToolAgent::new(descriptor, model, &stub_providers(), 3);

        let reply = assert_ok!(agent.answer("AAPL news").await);
        assert_eq!(reply.content, "Apple news summary");
        assert_eq!(reply.tool_calls.len(), 1);
    }

    #[test]
    fn test_render_tool_calls() {
        let rendered = render_tool_calls(&[
            ToolCallRecord {
                tool_name: "get_company_news".into(),
                arguments: json!({"symbol": "TSLA", "num_stories": 2}),
                success: true,
                elapsed_ms: 3,
            },
            ToolCallRecord {
                tool_name: "noop".into(),
                arguments: Value::Null,
                success: true,
                elapsed_ms: 0,
            },
        ]);

        assert_eq!(
            rendered,
            " - Running: get_company_news(num_stories=2, symbol=TSLA)\n - Running: noop()"
        );
    }
}
