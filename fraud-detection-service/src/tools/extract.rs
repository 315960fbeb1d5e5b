use rig::{completion::ToolDefinition, tool::Tool};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{ToolError, parse_args};
use crate::gateway::FunctionGateway;

#[derive(Debug, Deserialize)]
pub struct ExtractIndicatorsArgs {
    pub claim_text: String,
}

#[derive(Clone)]
pub struct ExtractIndicatorsTool {
    gateway: Arc<FunctionGateway>,
}

impl ExtractIndicatorsTool {
    pub fn new(gateway: Arc<FunctionGateway>) -> Self {
        Self { gateway }
    }

    pub async fn run(&self, args: Value) -> Value {
        let args: ExtractIndicatorsArgs = match parse_args(Self::NAME, args) {
            Ok(args) => args,
            Err(e) => return e.into_payload(),
        };

        match self.gateway.extract_indicators(&args.claim_text).await {
            Some(indicators) => indicators.0,
            None => json!({ "error": "Extraction failed" }),
        }
    }
}

impl Tool for ExtractIndicatorsTool {
    const NAME: &'static str = "extract_indicators";

    type Error = ToolError;
    type Args = Value;
    type Output = Value;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Extracts fraud indicators from claim including risk score, red flags, anomaly indicators, urgency level, and financial impact. Use after classification to get detailed analysis. Returns JSON with structured indicators.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "claim_text": {
                        "type": "string",
                        "description": "The claim text to extract fraud indicators from"
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
