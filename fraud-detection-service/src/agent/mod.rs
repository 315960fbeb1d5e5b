//! Claim analysis through a tool-calling reasoning loop.
//!
//! The loop itself belongs to the LLM library behind [`ReasoningDriver`]; this
//! module supplies the prompt and tools, then rebuilds the ordered list of
//! tool invocations from the transcript the driver returns.

pub mod prompts;
pub mod rig_driver;

#[cfg(test)]
pub mod testing;

pub use rig_driver::RigDriver;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;
use workspace_client::PlatformError;

use crate::{gateway::FunctionGateway, tools::ToolRegistry, vector::FraudPatternSearch};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent unavailable: {0}")]
    Unavailable(String),

    #[error("Reasoning failed: {0}")]
    Reasoning(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// One step of a reasoning transcript, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptEvent {
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    /// `name` is filled in only by drivers that report it alongside results.
    ToolResult {
        id: String,
        name: Option<String>,
        content: String,
    },
    AssistantText {
        text: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct AgentRun {
    pub events: Vec<TranscriptEvent>,
    pub final_answer: String,
}

#[async_trait]
pub trait ReasoningDriver: Send + Sync {
    /// Runs a bounded reason/act/observe loop over `tools`.
    async fn run(
        &self,
        system_prompt: &str,
        user_message: &str,
        tools: ToolRegistry,
    ) -> Result<AgentRun, AgentError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
    pub result: Option<String>,
}

/// Pairs every tool call with its result.
///
/// A result attaches to the call with the same id; failing that, to the first
/// unanswered call with the same tool name; failing that, to the first
/// unanswered call. Calls keep transcript order.
pub fn pair_invocations(events: &[TranscriptEvent]) -> Vec<ToolInvocation> {
    let mut ids: Vec<&str> = Vec::new();
    let mut invocations: Vec<ToolInvocation> = Vec::new();

    for event in events {
        match event {
            TranscriptEvent::ToolCall {
                id,
                name,
                arguments,
            } => {
                ids.push(id);
                invocations.push(ToolInvocation {
                    name: name.clone(),
                    arguments: arguments.clone(),
                    result: None,
                });
            }
            TranscriptEvent::ToolResult { id, name, content } => {
                let open = |i: &usize| invocations[*i].result.is_none();
                let slot = (0..invocations.len())
                    .filter(open)
                    .find(|i| ids[*i] == id)
                    .or_else(|| {
                        name.as_ref().and_then(|name| {
                            (0..invocations.len())
                                .filter(open)
                                .find(|i| &invocations[*i].name == name)
                        })
                    })
                    .or_else(|| (0..invocations.len()).find(open));

                if let Some(i) = slot {
                    invocations[i].result = Some(content.clone());
                }
            }
            TranscriptEvent::AssistantText { .. } => {}
        }
    }

    invocations
}

#[derive(Debug, Clone)]
pub struct ClaimAnalysis {
    pub session_id: Uuid,
    pub invocations: Vec<ToolInvocation>,
    pub final_answer: String,
    pub elapsed: Duration,
}

/// Process-wide entry point for claim analysis. Each call gets its own tool
/// set so classifications never leak between claims.
#[derive(Clone)]
pub struct ClaimAnalyzer {
    driver: Arc<dyn ReasoningDriver>,
    gateway: Arc<FunctionGateway>,
    patterns: Arc<FraudPatternSearch>,
}

impl ClaimAnalyzer {
    pub fn new(
        driver: Arc<dyn ReasoningDriver>,
        gateway: Arc<FunctionGateway>,
        patterns: Arc<FraudPatternSearch>,
    ) -> Self {
        Self {
            driver,
            gateway,
            patterns,
        }
    }

    /// Quick classification without the reasoning loop.
    pub fn gateway(&self) -> &FunctionGateway {
        &self.gateway
    }

    pub fn patterns(&self) -> &FraudPatternSearch {
        &self.patterns
    }

    pub async fn analyze(&self, claim_text: &str) -> Result<ClaimAnalysis, AgentError> {
        let session_id = Uuid::new_v4();
        let span = info_span!("claim_analysis", %session_id);

        async move {
            info!(claim_chars = claim_text.chars().count(), "Starting claim analysis");
            let started = Instant::now();
            let tools = ToolRegistry::new(self.gateway.clone(), self.patterns.clone());

            let run = self
                .driver
                .run(
                    prompts::SYSTEM_PROMPT,
                    &prompts::analysis_request(claim_text),
                    tools,
                )
                .await
                .map_err(|e| {
                    error!(error = %e, "Claim analysis failed");
                    e
                })?;

            let invocations = pair_invocations(&run.events);
            let elapsed = started.elapsed();
            info!(
                tool_calls = invocations.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Claim analysis completed"
            );

            Ok(ClaimAnalysis {
                session_id,
                invocations,
                final_answer: run.final_answer,
                elapsed,
            })
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedDriver;
    use super::*;
    use serde_json::json;
    use workspace_client::{StatementExecution, VectorSearch, testing::ScriptedApiClient};

    fn call(id: &str, name: &str) -> TranscriptEvent {
        TranscriptEvent::ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: json!({ "claim_text": "c" }),
        }
    }

    fn result(id: &str, name: Option<&str>, content: &str) -> TranscriptEvent {
        TranscriptEvent::ToolResult {
            id: id.to_string(),
            name: name.map(str::to_string),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_pairing_by_id_out_of_order() {
        let events = vec![
            call("a", "classify_claim"),
            call("b", "extract_indicators"),
            result("b", None, "indicators"),
            result("a", None, "classification"),
            TranscriptEvent::AssistantText {
                text: "done".to_string(),
            },
        ];
        let invocations = pair_invocations(&events);
        assert_eq!(invocations.len(), 2);
        assert_eq!(invocations[0].name, "classify_claim");
        assert_eq!(invocations[0].result.as_deref(), Some("classification"));
        assert_eq!(invocations[1].result.as_deref(), Some("indicators"));
    }

    #[test]
    fn test_pairing_falls_back_to_name_then_order() {
        let events = vec![
            call("1", "classify_claim"),
            call("2", "search_fraud_patterns"),
            result("x", Some("search_fraud_patterns"), "matches"),
            result("y", None, "verdict"),
            call("3", "generate_explanation"),
        ];
        let invocations = pair_invocations(&events);
        assert_eq!(invocations[1].result.as_deref(), Some("matches"));
        assert_eq!(invocations[0].result.as_deref(), Some("verdict"));
        assert_eq!(invocations[2].result, None);
    }

    #[tokio::test]
    async fn test_analyze_runs_tools_through_driver() {
        let api = Arc::new(ScriptedApiClient::new());
        api.push_ok(json!({
            "status": { "state": "SUCCEEDED" },
            "result": { "data_array": [[
                "{\"is_fraudulent\": true, \"fraud_probability\": 0.92, \"fraud_type\": \"Upcoding\"}"
            ]] }
        }));

        let driver = Arc::new(ScriptedDriver::new(
            vec![("classify_claim", json!({ "claim_text": "CLM-1" }))],
            "Likely upcoding.",
        ));
        let analyzer = ClaimAnalyzer::new(
            driver.clone(),
            Arc::new(FunctionGateway::new(
                StatementExecution::new(api.clone()),
                "wh",
                "cat",
                "sch",
            )),
            Arc::new(FraudPatternSearch::new(VectorSearch::new(api), "idx")),
        );

        let analysis = analyzer.analyze("CLM-1").await.unwrap();
        assert_eq!(analysis.final_answer, "Likely upcoding.");
        assert_eq!(analysis.invocations.len(), 1);
        let output: Value =
            serde_json::from_str(analysis.invocations[0].result.as_deref().unwrap()).unwrap();
        assert_eq!(output["fraud_type"], "Upcoding");

        let prompts = driver.prompts();
        assert_eq!(prompts[0].0, prompts::SYSTEM_PROMPT);
        assert_eq!(
            prompts[0].1,
            "Analyze this healthcare claim for fraud and provide a comprehensive assessment: CLM-1"
        );
    }

    #[tokio::test]
    async fn test_driver_failure_propagates() {
        let api = Arc::new(ScriptedApiClient::new());
        let analyzer = ClaimAnalyzer::new(
            Arc::new(ScriptedDriver::failing("endpoint overloaded")),
            Arc::new(FunctionGateway::new(
                StatementExecution::new(api.clone()),
                "wh",
                "cat",
                "sch",
            )),
            Arc::new(FraudPatternSearch::new(VectorSearch::new(api), "idx")),
        );
        let err = analyzer.analyze("claim").await.unwrap_err();
        assert!(matches!(err, AgentError::Reasoning(_)));
    }
}
