//! SQL Statement Execution API.
//!
//! Statements are submitted with an inline JSON_ARRAY disposition, so every
//! cell arrives as a JSON value (usually a string, or `null`).

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::{client::ApiClient, error::Result};

pub const STATEMENTS_PATH: &str = "/api/2.0/sql/statements";

/// Longest wait the service accepts before handing back a pending statement.
pub const DEFAULT_WAIT_TIMEOUT: &str = "50s";

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteStatementRequest {
    pub warehouse_id: String,
    pub statement: String,
    pub wait_timeout: String,
    pub disposition: String,
    pub format: String,
}

impl ExecuteStatementRequest {
    pub fn new(warehouse_id: impl Into<String>, statement: impl Into<String>) -> Self {
        Self {
            warehouse_id: warehouse_id.into(),
            statement: statement.into(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT.to_string(),
            disposition: "INLINE".to_string(),
            format: "JSON_ARRAY".to_string(),
        }
    }

    pub fn with_wait_timeout(mut self, wait_timeout: impl Into<String>) -> Self {
        self.wait_timeout = wait_timeout.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Closed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementStatus {
    pub state: StatementState,
    #[serde(default)]
    pub error: Option<ServiceError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSchema {
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultManifest {
    #[serde(default)]
    pub schema: Option<ResultSchema>,
    #[serde(default)]
    pub total_row_count: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultData {
    #[serde(default)]
    pub data_array: Option<Vec<Vec<Value>>>,
    /// Set when further chunks follow the inline one.
    #[serde(default)]
    pub next_chunk_index: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementResponse {
    #[serde(default)]
    pub statement_id: Option<String>,
    pub status: StatementStatus,
    #[serde(default)]
    pub manifest: Option<ResultManifest>,
    #[serde(default)]
    pub result: Option<ResultData>,
}

impl StatementResponse {
    pub fn succeeded(&self) -> bool {
        self.status.state == StatementState::Succeeded
    }

    pub fn error_message(&self) -> Option<&str> {
        self.status
            .error
            .as_ref()
            .and_then(|e| e.message.as_deref())
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        self.result
            .as_ref()
            .and_then(|r| r.data_array.as_deref())
            .unwrap_or(&[])
    }

    /// Whether rows beyond the first inline chunk were left unread.
    pub fn has_more_chunks(&self) -> bool {
        self.result
            .as_ref()
            .is_some_and(|r| r.next_chunk_index.is_some())
    }

    pub fn first_cell(&self) -> Option<&Value> {
        self.rows().first().and_then(|row| row.first())
    }

    pub fn column_names(&self) -> Vec<String> {
        self.manifest
            .as_ref()
            .and_then(|m| m.schema.as_ref())
            .map(|s| s.columns.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }
}

/// Thin wrapper over the statements endpoint for one API client.
#[derive(Clone)]
pub struct StatementExecution {
    api: Arc<dyn ApiClient>,
}

impl StatementExecution {
    pub fn new(api: Arc<dyn ApiClient>) -> Self {
        Self { api }
    }

    pub async fn execute(&self, request: &ExecuteStatementRequest) -> Result<StatementResponse> {
        debug!(
            warehouse_id = %request.warehouse_id,
            wait_timeout = %request.wait_timeout,
            "Submitting SQL statement"
        );
        let body = serde_json::to_value(request)?;
        let response = self
            .api
            .request(Method::POST, STATEMENTS_PATH, Some(body))
            .await?;
        Ok(serde_json::from_value(response)?)
    }

    /// Convenience for the common case of default wait and disposition.
    pub async fn query(
        &self,
        warehouse_id: &str,
        statement: impl Into<String>,
    ) -> Result<StatementResponse> {
        self.execute(&ExecuteStatementRequest::new(warehouse_id, statement))
            .await
    }
}
