//! The four tools exposed to the reasoning loop.
//!
//! Each tool wraps exactly one gateway or vector-search call and always
//! answers with JSON: the decoded payload on success, `{"error": ...}`
//! otherwise.

pub mod classify;
pub mod explain;
pub mod extract;
pub mod search;

pub use classify::{ClassifyClaimArgs, ClassifyClaimTool};
pub use explain::{GenerateExplanationArgs, GenerateExplanationTool};
pub use extract::{ExtractIndicatorsArgs, ExtractIndicatorsTool};
pub use search::{SearchFraudPatternsArgs, SearchFraudPatternsTool};

use rig::{agent::AgentBuilder, completion::CompletionModel, tool::Tool};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

use crate::{gateway::FunctionGateway, models::Classification, vector::FraudPatternSearch};

pub const TOOL_NAMES: [&str; 4] = [
    ClassifyClaimTool::NAME,
    ExtractIndicatorsTool::NAME,
    SearchFraudPatternsTool::NAME,
    GenerateExplanationTool::NAME,
];

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ToolError {
    /// The error as a payload handed back to the model.
    pub fn into_payload(self) -> Value {
        json!({ "error": self.to_string() })
    }
}

/// Classifications produced during one analysis, in call order.
///
/// `generate_explanation` reads from here rather than trusting flags echoed
/// back by the model.
#[derive(Debug, Default)]
pub struct ClassificationLedger {
    entries: Mutex<Vec<(String, Classification)>>,
}

impl ClassificationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, claim_text: &str, classification: Classification) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((claim_text.trim().to_string(), classification));
    }

    /// Latest classification of this exact claim text, else the latest one
    /// recorded in the session.
    pub fn resolve(&self, claim_text: &str) -> Option<Classification> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let key = claim_text.trim();
        entries
            .iter()
            .rev()
            .find(|(claim, _)| claim == key)
            .or_else(|| entries.last())
            .map(|(_, classification)| classification.clone())
    }
}

/// Tool set for a single analysis session.
#[derive(Clone)]
pub struct ToolRegistry {
    classify: ClassifyClaimTool,
    extract: ExtractIndicatorsTool,
    search: SearchFraudPatternsTool,
    explain: GenerateExplanationTool,
}

impl ToolRegistry {
    /// Builds the tools around a fresh classification ledger.
    pub fn new(gateway: Arc<FunctionGateway>, patterns: Arc<FraudPatternSearch>) -> Self {
        let ledger = Arc::new(ClassificationLedger::new());
        Self {
            classify: ClassifyClaimTool::new(gateway.clone(), ledger.clone()),
            extract: ExtractIndicatorsTool::new(gateway.clone()),
            search: SearchFraudPatternsTool::new(patterns),
            explain: GenerateExplanationTool::new(gateway, ledger),
        }
    }

    /// Registers every tool with a rig agent under construction.
    pub fn attach<M: CompletionModel>(&self, builder: AgentBuilder<M>) -> AgentBuilder<M> {
        builder
            .tool(self.classify.clone())
            .tool(self.extract.clone())
            .tool(self.search.clone())
            .tool(self.explain.clone())
    }

    /// Invokes a tool by name. Arguments that do not match the tool's schema
    /// produce an error payload, not an `Err`. Returns the JSON text handed
    /// back to the model.
    pub async fn call(&self, name: &str, args: Value) -> Result<String, ToolError> {
        let output = match name {
            ClassifyClaimTool::NAME => self.classify.run(args).await,
            ExtractIndicatorsTool::NAME => self.extract.run(args).await,
            SearchFraudPatternsTool::NAME => self.search.run(args).await,
            GenerateExplanationTool::NAME => self.explain.run(args).await,
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };
        Ok(to_json_text(&output))
    }
}

pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(
    tool: &str,
    args: Value,
) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|source| ToolError::InvalidArguments {
        tool: tool.to_string(),
        source,
    })
}

pub fn to_json_text(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
