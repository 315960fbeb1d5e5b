use rig::{completion::ToolDefinition, tool::Tool};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use super::{ClassificationLedger, ToolError, parse_args};
use crate::gateway::FunctionGateway;

#[derive(Debug, Deserialize)]
pub struct ClassifyClaimArgs {
    pub claim_text: String,
}

#[derive(Clone)]
pub struct ClassifyClaimTool {
    gateway: Arc<FunctionGateway>,
    ledger: Arc<ClassificationLedger>,
}

impl ClassifyClaimTool {
    pub fn new(gateway: Arc<FunctionGateway>, ledger: Arc<ClassificationLedger>) -> Self {
        Self { gateway, ledger }
    }

    pub async fn run(&self, args: Value) -> Value {
        let args: ClassifyClaimArgs = match parse_args(Self::NAME, args) {
            Ok(args) => args,
            Err(e) => return e.into_payload(),
        };

        match self.gateway.classify(&args.claim_text).await {
            Some(claim) => {
                info!(
                    is_fraudulent = claim.classification.is_fraudulent,
                    fraud_type = claim.classification.fraud_type_or_none(),
                    "Claim classified"
                );
                self.ledger.record(&args.claim_text, claim.classification);
                Value::Object(claim.payload)
            }
            None => json!({ "error": "Classification failed" }),
        }
    }
}

impl Tool for ClassifyClaimTool {
    const NAME: &'static str = "classify_claim";

    type Error = ToolError;
    type Args = Value;
    type Output = Value;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Classifies a healthcare claim as fraudulent or legitimate. Use this FIRST to understand fraud risk. Returns JSON with is_fraudulent, fraud_probability, fraud_type, confidence.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "claim_text": {
                        "type": "string",
                        "description": "The insurance claim text to classify for fraud"
                    }
                },
                "required": ["claim_text"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        Ok(self.run(args).await)
    }
}
