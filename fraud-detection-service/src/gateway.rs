//! Remote function gateway.
//!
//! Invokes the fraud functions registered in the catalog through a single
//! `SELECT <fn>(...) AS result` statement and decodes whatever encoding the
//! first cell arrives in. Every failure collapses to `None` so callers can
//! render a typed error instead of aborting the request.

use serde_json::{Map, Value};
use tracing::{debug, warn};
use workspace_client::{ExecuteStatementRequest, StatementExecution};

use crate::models::{Classification, ClassifiedClaim, Explanation, Indicators};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UcFunction {
    Classify,
    ExtractIndicators,
    GenerateExplanation,
}

impl UcFunction {
    pub fn name(self) -> &'static str {
        match self {
            UcFunction::Classify => "fraud_classify",
            UcFunction::ExtractIndicators => "fraud_extract_indicators",
            UcFunction::GenerateExplanation => "fraud_generate_explanation",
        }
    }
}

/// Positional argument of a function call.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Text(String),
    Bool(bool),
    Number(f64),
}

impl SqlArg {
    fn render(&self) -> String {
        match self {
            SqlArg::Text(text) => sql_string_literal(text),
            SqlArg::Bool(flag) => flag.to_string(),
            SqlArg::Number(n) => n.to_string(),
        }
    }
}

impl From<&str> for SqlArg {
    fn from(value: &str) -> Self {
        SqlArg::Text(value.to_string())
    }
}

impl From<bool> for SqlArg {
    fn from(value: bool) -> Self {
        SqlArg::Bool(value)
    }
}

/// Single-quoted SQL string literal with embedded quotes doubled.
pub fn sql_string_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// The encodings a function result cell can arrive in.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Null,
    /// Plain text that did not parse as JSON.
    Text(String),
    Mapping(Map<String, Value>),
    /// A struct serialized as an array of its fields.
    Positional(Vec<Value>),
    Scalar(Value),
}

impl RawCell {
    /// Tags a cell, parsing JSON-encoded text into its structured form.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => RawCell::Null,
            Value::Object(map) => RawCell::Mapping(map),
            Value::Array(items) => RawCell::Positional(items),
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => RawCell::Mapping(map),
                Ok(Value::Array(items)) => RawCell::Positional(items),
                Ok(Value::Null) => RawCell::Null,
                _ => RawCell::Text(text),
            },
            other => RawCell::Scalar(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionOutput {
    Classification(ClassifiedClaim),
    Indicators(Indicators),
    Explanation(Explanation),
}

/// Decodes a result cell for a known function.
pub fn decode(function: UcFunction, cell: RawCell) -> Option<FunctionOutput> {
    match function {
        UcFunction::Classify => decode_classification(cell).map(FunctionOutput::Classification),
        UcFunction::ExtractIndicators => decode_indicators(cell).map(FunctionOutput::Indicators),
        UcFunction::GenerateExplanation => {
            decode_explanation(cell).map(FunctionOutput::Explanation)
        }
    }
}

fn decode_classification(cell: RawCell) -> Option<ClassifiedClaim> {
    match cell {
        RawCell::Mapping(map) => {
            let classification = serde_json::from_value(Value::Object(map.clone())).ok()?;
            Some(ClassifiedClaim {
                payload: map,
                classification,
            })
        }
        _ => None,
    }
}

fn decode_indicators(cell: RawCell) -> Option<Indicators> {
    let value = match cell {
        RawCell::Null => return None,
        RawCell::Text(text) => Value::String(text),
        RawCell::Mapping(map) => Value::Object(map),
        RawCell::Positional(items) => Value::Array(items),
        RawCell::Scalar(value) => value,
    };
    Some(Indicators(value))
}

fn decode_explanation(cell: RawCell) -> Option<Explanation> {
    match cell {
        RawCell::Mapping(map) => serde_json::from_value(Value::Object(map)).ok(),
        RawCell::Positional(mut fields) if fields.len() >= 3 => {
            let recommendations = list_field(fields.swap_remove(2));
            let key_findings = list_field(fields.swap_remove(1));
            let summary = match fields.swap_remove(0) {
                Value::String(text) => text,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            Some(Explanation {
                summary,
                key_findings,
                recommendations,
            })
        }
        _ => None,
    }
}

/// A list-valued struct field; may itself be JSON text, null means empty.
fn list_field(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(items)) => items,
            _ if text.is_empty() => Vec::new(),
            _ => vec![Value::String(text)],
        },
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

#[derive(Clone)]
pub struct FunctionGateway {
    statements: StatementExecution,
    warehouse_id: String,
    catalog: String,
    schema: String,
}

impl FunctionGateway {
    pub fn new(
        statements: StatementExecution,
        warehouse_id: impl Into<String>,
        catalog: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            statements,
            warehouse_id: warehouse_id.into(),
            catalog: catalog.into(),
            schema: schema.into(),
        }
    }

    pub fn call_statement(&self, function: UcFunction, args: &[SqlArg]) -> String {
        let rendered = args
            .iter()
            .map(SqlArg::render)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "SELECT {}.{}.{}({}) AS result",
            self.catalog,
            self.schema,
            function.name(),
            rendered
        )
    }

    /// Runs one function call. `None` means no usable result.
    pub async fn call(&self, function: UcFunction, args: &[SqlArg]) -> Option<FunctionOutput> {
        let statement = self.call_statement(function, args);
        debug!(function = function.name(), warehouse_id = %self.warehouse_id, "Calling catalog function");

        let request = ExecuteStatementRequest::new(&self.warehouse_id, statement);
        let response = match self.statements.execute(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(function = function.name(), error = %e, "Function call failed");
                return None;
            }
        };

        if !response.succeeded() {
            warn!(
                function = function.name(),
                state = ?response.status.state,
                error = response.error_message().unwrap_or("none"),
                "Function call did not succeed"
            );
            return None;
        }

        let Some(cell) = response.first_cell().cloned() else {
            warn!(function = function.name(), "Function call returned no rows");
            return None;
        };

        let output = decode(function, RawCell::from_value(cell));
        if output.is_none() {
            warn!(function = function.name(), "Function result could not be decoded");
        }
        output
    }

    pub async fn classify(&self, claim_text: &str) -> Option<ClassifiedClaim> {
        match self.call(UcFunction::Classify, &[claim_text.into()]).await? {
            FunctionOutput::Classification(c) => Some(c),
            _ => None,
        }
    }

    pub async fn extract_indicators(&self, claim_text: &str) -> Option<Indicators> {
        match self
            .call(UcFunction::ExtractIndicators, &[claim_text.into()])
            .await?
        {
            FunctionOutput::Indicators(i) => Some(i),
            _ => None,
        }
    }

    /// Explanation depends on a prior classification of the same claim.
    pub async fn explain(
        &self,
        claim_text: &str,
        classification: &Classification,
    ) -> Option<Explanation> {
        let args = [
            SqlArg::from(claim_text),
            SqlArg::from(classification.is_fraudulent),
            SqlArg::from(classification.fraud_type_or_none()),
        ];
        match self.call(UcFunction::GenerateExplanation, &args).await? {
            FunctionOutput::Explanation(e) => Some(e),
            _ => None,
        }
    }
}
