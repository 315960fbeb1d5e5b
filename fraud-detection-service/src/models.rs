use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Verdict returned by the classification function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_fraudulent: bool,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fraud_probability: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraud_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub confidence: f64,
    /// Anything else the function chose to return, kept for display.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Classification {
    /// Fraud type as passed on to the explanation function.
    pub fn fraud_type_or_none(&self) -> &str {
        self.fraud_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("none")
    }
}

/// A classification together with the mapping the function returned. The
/// mapping is what the model and the caller see.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedClaim {
    pub payload: Map<String, Value>,
    pub classification: Classification,
}

/// Indicator extraction output. Its shape belongs to the remote function, so
/// it is carried as opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Indicators(pub Value);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_findings: Vec<Value>,
    #[serde(default)]
    pub recommendations: Vec<Value>,
}

/// One nearest-neighbour document from the fraud knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub doc_id: Value,
    pub doc_type: Value,
    pub title: Value,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeClaimRequest {
    #[serde(default)]
    pub claim_text: Option<String>,
    /// Name of an entry in the sample catalog, used when no text is given.
    #[serde(default)]
    pub sample: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuickCheckRequest {
    pub claim_text: String,
}

#[derive(Debug, Deserialize)]
pub struct CaseSearchQuery {
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(flag) => flag,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    })
}
