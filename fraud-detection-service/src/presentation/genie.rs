use serde::Serialize;
use serde_json::Value;
use workspace_client::{GenieOutcome, QueryTable};

use super::charts::{ChartPanel, Orientation};

pub const UNAVAILABLE_MESSAGE: &str =
    "⚠️ Genie Space not configured. The Genie natural language interface is currently unavailable.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenieStatus {
    Completed,
    Failed,
    Cancelled,
    TimedOut,
    StartFailed,
    Unavailable,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// What the natural-language query box shows for one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenieView {
    pub question: String,
    pub status: GenieStatus,
    pub answer: Option<String>,
    pub sql: Option<String>,
    pub table: Option<QueryTable>,
    pub chart: Option<ChartPanel>,
    pub notices: Vec<Notice>,
}

impl GenieView {
    fn empty(question: &str, status: GenieStatus) -> Self {
        Self {
            question: question.to_string(),
            status,
            answer: None,
            sql: None,
            table: None,
            chart: None,
            notices: Vec::new(),
        }
    }

    fn with_notice(mut self, level: NoticeLevel, message: impl Into<String>) -> Self {
        self.notices.push(Notice::new(level, message));
        self
    }

    pub fn unavailable(question: &str) -> Self {
        Self::empty(question, GenieStatus::Unavailable)
            .with_notice(NoticeLevel::Warning, UNAVAILABLE_MESSAGE)
    }

    pub fn error(question: &str, error: impl std::fmt::Display) -> Self {
        Self::empty(question, GenieStatus::Error)
            .with_notice(NoticeLevel::Error, format!("Error executing Genie query: {error}"))
    }

    pub fn from_outcome(question: &str, outcome: GenieOutcome) -> Self {
        match outcome {
            GenieOutcome::Completed(answer) => {
                let mut view = Self::empty(question, GenieStatus::Completed);
                if !answer.has_attachment {
                    return view.with_notice(
                        NoticeLevel::Info,
                        "Query completed but no results available.",
                    );
                }

                view.answer = answer.text;
                view.sql = answer.sql;

                if let Some(table) = answer.table {
                    view.notices.push(Notice::new(
                        NoticeLevel::Success,
                        format!("✅ Found {} results", table.rows.len()),
                    ));
                    view.chart = auto_chart(&table);
                    view.table = Some(table);
                } else if let Some(warning) = answer.result_warning {
                    view.notices.push(Notice::new(NoticeLevel::Warning, warning));
                } else if view.sql.is_some() {
                    view.notices.push(Notice::new(
                        NoticeLevel::Info,
                        "Query executed successfully but returned no results.",
                    ));
                }
                view
            }
            GenieOutcome::Failed { error } => Self::empty(question, GenieStatus::Failed)
                .with_notice(NoticeLevel::Error, format!("Query failed: {error}")),
            GenieOutcome::Cancelled => Self::empty(question, GenieStatus::Cancelled)
                .with_notice(NoticeLevel::Warning, "Query was cancelled"),
            GenieOutcome::TimedOut { .. } => Self::empty(question, GenieStatus::TimedOut)
                .with_notice(
                    NoticeLevel::Warning,
                    "Query timed out. Please try a simpler question.",
                ),
            GenieOutcome::StartFailed => Self::empty(question, GenieStatus::StartFailed)
                .with_notice(NoticeLevel::Error, "Failed to start Genie conversation"),
        }
    }
}

/// Bar chart of the first column against the second, for two-column results
/// of 2..=49 rows whose second column is numeric.
pub fn auto_chart(table: &QueryTable) -> Option<ChartPanel> {
    let rows = table.rows.len();
    if table.columns.len() != 2 || rows <= 1 || rows >= 50 {
        return None;
    }

    let mut labels = Vec::with_capacity(rows);
    let mut values = Vec::with_capacity(rows);
    for row in &table.rows {
        labels.push(cell_text(row.first()));
        values.push(cell_number(row.get(1))?);
    }

    Some(ChartPanel::Bar {
        title: String::new(),
        orientation: Orientation::Vertical,
        label_axis: table.columns[0].clone(),
        value_axis: table.columns[1].clone(),
        labels,
        values,
    })
}

fn cell_text(cell: Option<&Value>) -> String {
    match cell {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn cell_number(cell: Option<&Value>) -> Option<f64> {
    match cell? {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
