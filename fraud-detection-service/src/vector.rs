use serde_json::{Value, json};
use tracing::{info, warn};
use workspace_client::{VectorQuery, VectorSearch};

use crate::models::PatternMatch;

pub const PATTERN_COLUMNS: [&str; 4] = ["doc_id", "doc_type", "title", "content"];
pub const NUM_RESULTS: usize = 3;
/// Matched documents are cut to this many characters before they reach the
/// reasoning loop.
pub const CONTENT_CHAR_LIMIT: usize = 500;

/// Nearest-neighbour search over the fraud knowledge base.
#[derive(Clone)]
pub struct FraudPatternSearch {
    search: VectorSearch,
    index: String,
}

impl FraudPatternSearch {
    pub fn new(search: VectorSearch, index: impl Into<String>) -> Self {
        Self {
            search,
            index: index.into(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Returns a JSON array of matches, or `{"error": ...}` on failure.
    pub async fn search(&self, query_text: &str) -> Value {
        let query = VectorQuery {
            columns: PATTERN_COLUMNS.iter().map(|c| c.to_string()).collect(),
            num_results: NUM_RESULTS,
            query_text: query_text.to_string(),
        };

        let body = match self.search.query(&self.index, &query).await {
            Ok(body) => body,
            Err(e) => {
                warn!(index = %self.index, error = %e, "Vector search request failed");
                return json!({ "error": format!("Search failed: {e}") });
            }
        };

        if body.get("error_code").is_some() {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            warn!(index = %self.index, %message, "Vector search returned an error body");
            return json!({ "error": format!("Vector Search error: {message}") });
        }

        let matches = parse_matches(&body);
        info!(index = %self.index, matches = matches.len(), "Vector search completed");
        serde_json::to_value(matches).unwrap_or_else(|_| json!([]))
    }
}

fn parse_matches(body: &Value) -> Vec<PatternMatch> {
    body.pointer("/result/data_array")
        .and_then(Value::as_array)
        .map(|rows| rows.iter().filter_map(parse_row).collect())
        .unwrap_or_default()
}

fn parse_row(row: &Value) -> Option<PatternMatch> {
    let row = row.as_array()?;
    let field = |i: usize| row.get(i).cloned().unwrap_or(Value::Null);
    let content = match row.get(3) {
        Some(Value::String(text)) => truncate_chars(text, CONTENT_CHAR_LIMIT),
        Some(Value::Null) | None => String::new(),
        Some(other) => truncate_chars(&other.to_string(), CONTENT_CHAR_LIMIT),
    };
    Some(PatternMatch {
        doc_id: field(0),
        doc_type: field(1),
        title: field(2),
        content,
    })
}

pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
