use async_trait::async_trait;
use rig::{
    agent::AgentBuilder,
    client::CompletionClient,
    completion::{
        Message, Prompt,
        message::{AssistantContent, ToolResultContent, UserContent},
    },
    providers::openai,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use workspace_client::WorkspaceClient;

use super::{AgentError, AgentRun, ReasoningDriver, TranscriptEvent};
use crate::tools::ToolRegistry;

pub const TEMPERATURE: f64 = 0.1;
pub const MAX_TOKENS: u64 = 2000;
pub const MAX_TURNS: usize = 8;

/// rig agent over the workspace's OpenAI-compatible model serving endpoint.
pub struct RigDriver {
    workspace: Arc<WorkspaceClient>,
    endpoint: String,
}

impl RigDriver {
    pub fn new(workspace: Arc<WorkspaceClient>, endpoint: impl Into<String>) -> Self {
        Self {
            workspace,
            endpoint: endpoint.into(),
        }
    }

    fn base_url(&self) -> String {
        format!("{}/serving-endpoints", self.workspace.host())
    }
}

#[async_trait]
impl ReasoningDriver for RigDriver {
    async fn run(
        &self,
        system_prompt: &str,
        user_message: &str,
        tools: ToolRegistry,
    ) -> Result<AgentRun, AgentError> {
        // OAuth tokens expire, so the client is rebuilt around a fresh one.
        let token = self.workspace.access_token().await?;
        let client = openai::Client::builder(&token)
            .base_url(&self.base_url())
            .build()
            .map_err(|e| AgentError::Unavailable(e.to_string()))?;
        let model = client.completion_model(&self.endpoint).completions_api();

        let builder = AgentBuilder::new(model)
            .preamble(system_prompt)
            .temperature(TEMPERATURE)
            .max_tokens(MAX_TOKENS);
        let agent = tools.attach(builder).build();

        debug!(endpoint = %self.endpoint, max_turns = MAX_TURNS, "Prompting agent");
        let mut history: Vec<Message> = Vec::new();
        let final_answer = agent
            .prompt(user_message)
            .multi_turn(MAX_TURNS)
            .with_history(&mut history)
            .await
            .map_err(|e| AgentError::Reasoning(e.to_string()))?;

        let events = transcript_events(&history);
        info!(
            endpoint = %self.endpoint,
            messages = history.len(),
            events = events.len(),
            "Agent finished"
        );

        Ok(AgentRun {
            events,
            final_answer,
        })
    }
}

/// Flattens rig chat history into transcript events. User prompts are not
/// part of the transcript.
pub fn transcript_events(history: &[Message]) -> Vec<TranscriptEvent> {
    let mut events = Vec::new();
    for message in history {
        if let Message::Assistant { content, .. } = message {
            for item in content.iter() {
                match item {
                    AssistantContent::Text(text) if !text.text.trim().is_empty() => {
                        events.push(TranscriptEvent::AssistantText {
                            text: text.text.clone(),
                        });
                    }
                    AssistantContent::ToolCall(call) => {
                        events.push(TranscriptEvent::ToolCall {
                            id: call.id.clone(),
                            name: call.function.name.clone(),
                            arguments: parse_arguments(&call.function.arguments),
                        });
                    }
                    _ => {}
                }
            }
        } else if let Message::User { content, .. } = message {
            for item in content.iter() {
                if let UserContent::ToolResult(result) = item {
                    let text = result
                        .content
                        .iter()
                        .filter_map(|part| match part {
                            ToolResultContent::Text(text) => Some(text.text.as_str()),
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                        .join("\n");
                    events.push(TranscriptEvent::ToolResult {
                        id: result.id.clone(),
                        name: None,
                        content: text,
                    });
                }
            }
        }
    }
    events
}

/// Some providers send arguments as a JSON-encoded string.
fn parse_arguments(arguments: &Value) -> Value {
    match arguments {
        Value::String(text) => serde_json::from_str(text).unwrap_or_else(|_| arguments.clone()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ToolInvocation, pair_invocations};
    use rig::OneOrMany;
    use serde_json::json;

    #[test]
    fn test_tool_history_pairs_into_invocations() {
        let history = vec![
            Message::user("Analyze this healthcare claim"),
            Message::Assistant {
                id: None,
                content: OneOrMany::many(vec![
                    AssistantContent::text("Classifying first."),
                    AssistantContent::tool_call(
                        "call_a",
                        "classify_claim",
                        json!("{\"claim_text\": \"CLM-1\"}"),
                    ),
                    AssistantContent::tool_call(
                        "call_b",
                        "search_fraud_patterns",
                        json!({ "query": "upcoding" }),
                    ),
                ])
                .unwrap(),
            },
            // results arrive out of call order
            Message::tool_result("call_b", "[]"),
            Message::tool_result("call_a", "{\"is_fraudulent\": true}"),
            Message::assistant("The claim is likely upcoding."),
        ];

        let events = transcript_events(&history);
        assert_eq!(events.len(), 6);
        assert_eq!(
            events[1],
            TranscriptEvent::ToolCall {
                id: "call_a".to_string(),
                name: "classify_claim".to_string(),
                arguments: json!({ "claim_text": "CLM-1" }),
            }
        );
        assert_eq!(
            events[3],
            TranscriptEvent::ToolResult {
                id: "call_b".to_string(),
                name: None,
                content: "[]".to_string(),
            }
        );

        assert_eq!(
            pair_invocations(&events),
            vec![
                ToolInvocation {
                    name: "classify_claim".to_string(),
                    arguments: json!({ "claim_text": "CLM-1" }),
                    result: Some("{\"is_fraudulent\": true}".to_string()),
                },
                ToolInvocation {
                    name: "search_fraud_patterns".to_string(),
                    arguments: json!({ "query": "upcoding" }),
                    result: Some("[]".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_text_history_becomes_assistant_text() {
        let history = vec![
            Message::user("Analyze this claim"),
            Message::assistant("The claim looks legitimate."),
            Message::assistant("   "),
        ];
        assert_eq!(
            transcript_events(&history),
            vec![TranscriptEvent::AssistantText {
                text: "The claim looks legitimate.".to_string()
            }]
        );
    }

    #[test]
    fn test_string_arguments_are_decoded() {
        assert_eq!(
            parse_arguments(&json!("{\"claim_text\": \"CLM-1\"}")),
            json!({ "claim_text": "CLM-1" })
        );
        assert_eq!(parse_arguments(&json!("not json")), json!("not json"));
        assert_eq!(parse_arguments(&json!({ "q": 1 })), json!({ "q": 1 }));
    }
}
