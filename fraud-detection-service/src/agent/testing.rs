use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use super::{AgentError, AgentRun, ReasoningDriver, TranscriptEvent};
use crate::tools::ToolRegistry;

/// Driver that replays a fixed plan of tool calls against the real registry.
pub struct ScriptedDriver {
    plan: Vec<(String, Value)>,
    answer: Result<String, String>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedDriver {
    pub fn new(plan: Vec<(&str, Value)>, answer: &str) -> Self {
        Self {
            plan: plan
                .into_iter()
                .map(|(name, args)| (name.to_string(), args))
                .collect(),
            answer: Ok(answer.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            plan: Vec::new(),
            answer: Err(reason.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningDriver for ScriptedDriver {
    async fn run(
        &self,
        system_prompt: &str,
        user_message: &str,
        tools: ToolRegistry,
    ) -> Result<AgentRun, AgentError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_message.to_string()));

        let answer = self.answer.clone().map_err(AgentError::Reasoning)?;

        let mut events = Vec::new();
        for (i, (name, args)) in self.plan.iter().enumerate() {
            let id = format!("call_{i}");
            events.push(TranscriptEvent::ToolCall {
                id: id.clone(),
                name: name.clone(),
                arguments: args.clone(),
            });
            let content = tools
                .call(name, args.clone())
                .await
                .unwrap_or_else(|e| e.to_string());
            events.push(TranscriptEvent::ToolResult {
                id,
                name: None,
                content,
            });
        }
        events.push(TranscriptEvent::AssistantText {
            text: answer.clone(),
        });

        Ok(AgentRun {
            events,
            final_answer: answer,
        })
    }
}
