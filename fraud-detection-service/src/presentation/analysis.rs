use rig::tool::Tool;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{
    charts::{ChartPanel, Orientation, count_in_order},
    verdict::VerdictBanner,
};
use crate::{
    agent::{ClaimAnalysis, ToolInvocation},
    tools::{ClassifyClaimTool, TOOL_NAMES},
    vector::truncate_chars,
};

pub const COST_PER_TOOL_CALL: f64 = 0.0005;
pub const TEXT_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum ToolOutputView {
    Json {
        value: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        verdict: Option<VerdictBanner>,
    },
    Text {
        preview: String,
    },
    Missing {
        message: String,
    },
}

impl ToolOutputView {
    pub fn from_result(tool: &str, result: Option<&str>) -> Self {
        let Some(raw) = result else {
            return ToolOutputView::Missing {
                message: "No result".to_string(),
            };
        };

        match serde_json::from_str::<Value>(raw) {
            Ok(value) => {
                let verdict = (tool == ClassifyClaimTool::NAME)
                    .then(|| VerdictBanner::from_payload(&value))
                    .flatten();
                ToolOutputView::Json { value, verdict }
            }
            Err(_) => {
                let mut preview = truncate_chars(raw, TEXT_PREVIEW_CHARS);
                if preview.len() < raw.len() {
                    preview.push_str("...");
                }
                ToolOutputView::Text { preview }
            }
        }
    }
}

/// One expandable panel per tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolPanel {
    pub index: usize,
    pub tool: String,
    pub title: String,
    pub icon: &'static str,
    pub badge: &'static str,
    pub expanded: bool,
    pub input: Value,
    pub output: ToolOutputView,
}

pub fn tool_icon(tool: &str) -> &'static str {
    match tool {
        "classify_claim" => "🎯",
        "extract_indicators" => "📊",
        "search_fraud_patterns" => "🔍",
        "generate_explanation" => "💡",
        _ => "🔧",
    }
}

pub fn tool_badge(tool: &str) -> &'static str {
    match tool {
        "extract_indicators" => "extract-badge",
        "search_fraud_patterns" => "search-badge",
        "generate_explanation" => "explain-badge",
        _ => "classify-badge",
    }
}

impl ToolPanel {
    fn new(position: usize, invocation: &ToolInvocation) -> Self {
        let index = position + 1;
        let icon = tool_icon(&invocation.name);
        Self {
            index,
            tool: invocation.name.clone(),
            title: format!("{icon} Tool {index}: {}", invocation.name),
            icon,
            badge: tool_badge(&invocation.name),
            expanded: index == 1,
            input: invocation.arguments.clone(),
            output: ToolOutputView::from_result(&invocation.name, invocation.result.as_deref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub response_time_ms: u64,
    pub tools_used: String,
    pub estimated_cost: String,
    pub efficiency: String,
}

impl PerformanceMetrics {
    pub fn new(response_time_ms: u64, tool_calls: usize) -> Self {
        let available = TOOL_NAMES.len();
        Self {
            response_time_ms,
            tools_used: format!("{tool_calls}/{available}"),
            estimated_cost: format!("${:.4}", tool_calls as f64 * COST_PER_TOOL_CALL),
            efficiency: format!("{:.0}%", tool_calls as f64 / available as f64 * 100.0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub session_id: Uuid,
    pub status: String,
    /// Absent when the agent called no tools.
    pub tool_usage: Option<ChartPanel>,
    pub total_tool_calls: usize,
    pub unique_tools: usize,
    pub panels: Vec<ToolPanel>,
    pub final_answer: Option<String>,
    pub metrics: PerformanceMetrics,
}

impl AnalysisReport {
    pub fn from_analysis(analysis: &ClaimAnalysis) -> Self {
        let response_time_ms = analysis.elapsed.as_millis() as u64;
        let counts = count_in_order(analysis.invocations.iter().map(|i| i.name.as_str()));

        let tool_usage = (!counts.is_empty()).then(|| ChartPanel::Bar {
            title: "Tools Used by Agent".to_string(),
            orientation: Orientation::Horizontal,
            label_axis: String::new(),
            value_axis: "Number of Calls".to_string(),
            labels: counts.iter().map(|(name, _)| name.clone()).collect(),
            values: counts.iter().map(|(_, count)| *count as f64).collect(),
        });

        let final_answer = Some(analysis.final_answer.trim())
            .filter(|answer| !answer.is_empty())
            .map(str::to_string);

        Self {
            session_id: analysis.session_id,
            status: format!("✅ Analysis complete in {response_time_ms}ms"),
            tool_usage,
            total_tool_calls: analysis.invocations.len(),
            unique_tools: counts.len(),
            panels: analysis
                .invocations
                .iter()
                .enumerate()
                .map(|(position, invocation)| ToolPanel::new(position, invocation))
                .collect(),
            final_answer,
            metrics: PerformanceMetrics::new(response_time_ms, analysis.invocations.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::verdict::VerdictTone;
    use serde_json::json;
    use std::time::Duration;

    fn invocation(name: &str, result: Option<&str>) -> ToolInvocation {
        ToolInvocation {
            name: name.to_string(),
            arguments: json!({ "claim_text": "CLM-1" }),
            result: result.map(str::to_string),
        }
    }

    #[test]
    fn test_report_from_analysis() {
        let analysis = ClaimAnalysis {
            session_id: Uuid::new_v4(),
            invocations: vec![
                invocation(
                    "classify_claim",
                    Some(r#"{"is_fraudulent": true, "fraud_probability": 0.92, "fraud_type": "Upcoding"}"#),
                ),
                invocation("search_fraud_patterns", Some("[]")),
                invocation("search_fraud_patterns", None),
            ],
            final_answer: "High risk of upcoding.".to_string(),
            elapsed: Duration::from_millis(1234),
        };

        let report = AnalysisReport::from_analysis(&analysis);
        assert_eq!(report.status, "✅ Analysis complete in 1234ms");
        assert_eq!(report.total_tool_calls, 3);
        assert_eq!(report.unique_tools, 2);

        let Some(ChartPanel::Bar { labels, values, .. }) = &report.tool_usage else {
            panic!("expected tool usage chart");
        };
        assert_eq!(labels, &["classify_claim", "search_fraud_patterns"]);
        assert_eq!(values, &[1.0, 2.0]);

        let first = &report.panels[0];
        assert_eq!(first.title, "🎯 Tool 1: classify_claim");
        assert!(first.expanded);
        assert_eq!(first.badge, "classify-badge");
        let ToolOutputView::Json { verdict: Some(verdict), .. } = &first.output else {
            panic!("expected verdict banner");
        };
        assert_eq!(verdict.tone, VerdictTone::FraudAlert);
        assert_eq!(verdict.metric, "Risk: 92.0%");

        assert!(!report.panels[1].expanded);
        assert!(matches!(
            report.panels[1].output,
            ToolOutputView::Json { verdict: None, .. }
        ));
        assert_eq!(
            report.panels[2].output,
            ToolOutputView::Missing {
                message: "No result".to_string()
            }
        );

        assert_eq!(report.metrics.tools_used, "3/4");
        assert_eq!(report.metrics.estimated_cost, "$0.0015");
        assert_eq!(report.metrics.efficiency, "75%");
        assert_eq!(report.final_answer.as_deref(), Some("High risk of upcoding."));
    }

    #[test]
    fn test_non_json_output_is_previewed() {
        let long = "x".repeat(600);
        let ToolOutputView::Text { preview } =
            ToolOutputView::from_result("extract_indicators", Some(&long))
        else {
            panic!("expected text preview");
        };
        assert_eq!(preview.len(), 503);
        assert!(preview.ends_with("..."));

        assert_eq!(
            ToolOutputView::from_result("extract_indicators", Some("short text")),
            ToolOutputView::Text {
                preview: "short text".to_string()
            }
        );
    }

    #[test]
    fn test_empty_run() {
        let analysis = ClaimAnalysis {
            session_id: Uuid::new_v4(),
            invocations: Vec::new(),
            final_answer: "  ".to_string(),
            elapsed: Duration::from_millis(10),
        };
        let report = AnalysisReport::from_analysis(&analysis);
        assert!(report.tool_usage.is_none());
        assert!(report.final_answer.is_none());
        assert_eq!(report.metrics.estimated_cost, "$0.0000");
        assert_eq!(report.metrics.efficiency, "0%");
        assert_eq!(tool_icon("other"), "🔧");
    }
}
