use rig::{completion::ToolDefinition, tool::Tool};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{ToolError, parse_args};
use crate::vector::FraudPatternSearch;

#[derive(Debug, Deserialize)]
pub struct SearchFraudPatternsArgs {
    pub query: String,
}

#[derive(Clone)]
pub struct SearchFraudPatternsTool {
    patterns: Arc<FraudPatternSearch>,
}

impl SearchFraudPatternsTool {
    pub fn new(patterns: Arc<FraudPatternSearch>) -> Self {
        Self { patterns }
    }

    pub async fn run(&self, args: Value) -> Value {
        match parse_args::<SearchFraudPatternsArgs>(Self::NAME, args) {
            Ok(args) => self.patterns.search(&args.query).await,
            Err(e) => e.into_payload(),
        }
    }
}

impl Tool for SearchFraudPatternsTool {
    const NAME: &'static str = "search_fraud_patterns";

    type Error = ToolError;
    type Args = Value;
    type Output = Value;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Searches the fraud knowledge base for relevant patterns, schemes, and documentation using semantic search. Use to find similar fraud cases or detection techniques. Returns JSON array with title, content, fraud_type for top matches.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query to find relevant fraud patterns"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        Ok(self.run(args).await)
    }
}
