use serde::Serialize;
use serde_json::Value;

use crate::models::Classification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictTone {
    FraudAlert,
    Legitimate,
}

/// Headline treatment for a classification result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerdictBanner {
    pub tone: VerdictTone,
    pub headline: String,
    pub metric: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl VerdictBanner {
    pub fn from_classification(classification: &Classification) -> Self {
        if classification.is_fraudulent {
            let fraud_type = classification
                .fraud_type
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or("Unknown");
            Self {
                tone: VerdictTone::FraudAlert,
                headline: "⚠️ FRAUD DETECTED".to_string(),
                metric: format!("Risk: {}", percent(classification.fraud_probability)),
                detail: Some(format!("Type: {fraud_type}")),
            }
        } else {
            Self {
                tone: VerdictTone::Legitimate,
                headline: "✅ LEGITIMATE CLAIM".to_string(),
                metric: format!("Confidence: {}", percent(classification.confidence)),
                detail: None,
            }
        }
    }

    /// Banner for a raw `classify_claim` payload; `None` unless it is an
    /// object that reads as a classification.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        if !payload.is_object() || payload.get("error").is_some() {
            return None;
        }
        let classification: Classification = serde_json::from_value(payload.clone()).ok()?;
        Some(Self::from_classification(&classification))
    }
}

/// A 0..1 ratio as a percentage with one decimal.
pub fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fraud_payload_selects_alert() {
        let banner = VerdictBanner::from_payload(&json!({
            "is_fraudulent": true,
            "fraud_probability": 0.92,
            "fraud_type": "Upcoding"
        }))
        .unwrap();
        assert_eq!(banner.tone, VerdictTone::FraudAlert);
        assert_eq!(banner.metric, "Risk: 92.0%");
        assert!(banner.metric.contains("92.0%"));
        assert_eq!(banner.detail.as_deref(), Some("Type: Upcoding"));
    }

    #[test]
    fn test_legitimate_payload_shows_confidence() {
        let banner =
            VerdictBanner::from_payload(&json!({ "is_fraudulent": false, "confidence": 0.85 }))
                .unwrap();
        assert_eq!(banner.tone, VerdictTone::Legitimate);
        assert_eq!(banner.metric, "Confidence: 85.0%");
        assert!(banner.detail.is_none());
    }

    #[test]
    fn test_missing_type_and_non_objects() {
        let banner = VerdictBanner::from_payload(&json!({ "is_fraudulent": true })).unwrap();
        assert_eq!(banner.metric, "Risk: 0.0%");
        assert_eq!(banner.detail.as_deref(), Some("Type: Unknown"));

        assert!(VerdictBanner::from_payload(&json!([1, 2])).is_none());
        assert!(VerdictBanner::from_payload(&json!({ "error": "Classification failed" })).is_none());
    }
}
