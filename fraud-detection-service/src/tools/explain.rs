use rig::{completion::ToolDefinition, tool::Tool};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ClassificationLedger, ToolError, parse_args};
use crate::gateway::FunctionGateway;

/// The flags are accepted for schema compatibility only, in whatever shape
/// the model sends them. The classification recorded earlier in the session
/// is what reaches the remote function.
#[derive(Debug, Deserialize)]
pub struct GenerateExplanationArgs {
    pub claim_text: String,
    #[serde(default)]
    pub is_fraudulent: Option<Value>,
    #[serde(default)]
    pub fraud_type: Option<Value>,
}

#[derive(Clone)]
pub struct GenerateExplanationTool {
    gateway: Arc<FunctionGateway>,
    ledger: Arc<ClassificationLedger>,
}

impl GenerateExplanationTool {
    pub fn new(gateway: Arc<FunctionGateway>, ledger: Arc<ClassificationLedger>) -> Self {
        Self { gateway, ledger }
    }

    pub async fn run(&self, args: Value) -> Value {
        let args: GenerateExplanationArgs = match parse_args(Self::NAME, args) {
            Ok(args) => args,
            Err(e) => return e.into_payload(),
        };

        let Some(classification) = self.ledger.resolve(&args.claim_text) else {
            warn!("Explanation requested before any classification");
            return json!({
                "error": "No classification available. Call classify_claim first."
            });
        };

        let flag_differs = args
            .is_fraudulent
            .as_ref()
            .is_some_and(|flag| flag.as_bool() != Some(classification.is_fraudulent));
        let type_differs = args
            .fraud_type
            .as_ref()
            .is_some_and(|t| t.as_str() != Some(classification.fraud_type_or_none()));
        if flag_differs || type_differs {
            debug!(
                requested_fraudulent = ?args.is_fraudulent,
                requested_type = ?args.fraud_type,
                "Ignoring explanation flags that disagree with the recorded classification"
            );
        }

        match self.gateway.explain(&args.claim_text, &classification).await {
            Some(explanation) => serde_json::to_value(explanation)
                .unwrap_or_else(|_| json!({ "error": "Explanation generation failed" })),
            None => json!({ "error": "Explanation generation failed" }),
        }
    }
}

impl Tool for GenerateExplanationTool {
    const NAME: &'static str = "generate_explanation";

    type Error = ToolError;
    type Args = Value;
    type Output = Value;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Generates comprehensive fraud explanation with summary, risk factors, recommendations. REQUIRES results from classify_claim first. Pass claim_text, is_fraudulent (true/false), and fraud_type from classification. Returns JSON with detailed explanation.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "claim_text": {
                        "type": "string",
                        "description": "The claim text to explain"
                    },
                    "is_fraudulent": {
                        "type": "boolean",
                        "description": "Whether the claim is fraudulent (from classification)"
                    },
                    "fraud_type": {
                        "type": "string",
                        "description": "The type of fraud detected (from classification)",
                        "default": "none"
                    }
                },
                "required": ["claim_text", "is_fraudulent"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        Ok(self.run(args).await)
    }
}
