//! Coordinating agent
//!
//! The team leader is a [`ToolAgent`] whose only tools are delegations:
//! one `transfer_task_to_<member>` function per capability agent. The model
//! decides which members to call and merges their answers.

use super::runner::ToolAgent;
use super::{AgentDescriptor, CapabilityAgent, Coordinator};
use crate::error::AnalystError;
use crate::llm::ChatModel;
use crate::models::{AgentReply, ToolInput, ToolOutput};
use crate::tools::{Tool, ToolRegistry};
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Exposes a capability agent to the team leader as a callable function
pub struct DelegateTool {
    name: String,
    description: String,
    member: Arc<dyn CapabilityAgent>,
}

impl DelegateTool {
    pub fn new(member: Arc<dyn CapabilityAgent>) -> Self {
        let descriptor = member.descriptor();
        let name = format!("transfer_task_to_{}", descriptor.id);
        let description = match &descriptor.role {
            Some(role) => format!(
                "Transfer a task to {}. Role: {}. Returns the member's answer.",
                descriptor.name, role
            ),
            None => format!(
                "Transfer a task to {}. Returns the member's answer.",
                descriptor.name
            ),
        };

        Self {
            name,
            description,
            member,
        }
    }
}

#[async_trait]
impl Tool for DelegateTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_description": {
                    "type": "string",
                    "description": "A complete, self-contained description of the task for the member"
                },
                "expected_output": {
                    "type": "string",
                    "description": "What the member's answer should contain"
                }
            },
            "required": ["task_description"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let task = input
            .parameters
            .get("task_description")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AnalystError::InvalidToolInput(format!(
                    "Expected 'task_description' for {}",
                    self.name
                ))
            })?;

        let request = match input
            .parameters
            .get("expected_output")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|e| !e.is_empty())
        {
            Some(expected) => format!("{}\n\nThe expected output is: {}", task, expected),
            None => task.to_string(),
        };

        info!(member = %self.member.descriptor().name, "Delegating task");
        let reply = self.member.answer(&request).await?;

        Ok(ToolOutput::ok(json!({
            "agent": reply.agent,
            "content": reply.content,
        })))
    }
}

/// Model-driven coordinator over a fixed set of capability agents
pub struct TeamCoordinator {
    leader: ToolAgent,
    members: Vec<Arc<dyn CapabilityAgent>>,
}

impl TeamCoordinator {
    pub fn new(
        descriptor: AgentDescriptor,
        model: Arc<dyn ChatModel>,
        members: Vec<Arc<dyn CapabilityAgent>>,
        max_tool_rounds: usize,
    ) -> Self {
        let mut tools = ToolRegistry::new();
        let mut roster = String::new();

        for member in &members {
            let delegate = DelegateTool::new(member.clone());
            let member_descriptor = member.descriptor();
            roster.push_str(&format!(
                "- {}: {}{}\n",
                delegate.name(),
                member_descriptor.name,
                member_descriptor
                    .role
                    .as_deref()
                    .map(|role| format!(" ({})", role))
                    .unwrap_or_default()
            ));
            tools.register(Arc::new(delegate));
        }

        let system_instruction = format!(
            "{}\n\n## Team members\n\
             You lead a team of agents. Delegate work by calling the matching transfer function:\n\
             {}\n\
             Give each member a complete, self-contained task. Only report data that a member returned.",
            descriptor.system_instruction().trim_end(),
            roster
        );

        Self {
            leader: ToolAgent::with_registry(
                descriptor,
                system_instruction,
                model,
                tools,
                max_tool_rounds,
            ),
            members,
        }
    }

    pub fn members(&self) -> &[Arc<dyn CapabilityAgent>] {
        &self.members
    }

    pub fn descriptor(&self) -> &AgentDescriptor {
        self.leader.descriptor()
    }
}

#[async_trait]
impl Coordinator for TeamCoordinator {
    async fn coordinate(&self, query: &str) -> Result<AgentReply> {
        self.leader.run(query).await
    }
}
