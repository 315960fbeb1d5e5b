use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::{client::ApiClient, error::Result};

#[derive(Debug, Clone, Serialize)]
pub struct VectorQuery {
    pub columns: Vec<String>,
    pub num_results: usize,
    pub query_text: String,
}

pub fn index_query_path(index: &str) -> String {
    format!("/api/2.0/vector-search/indexes/{index}/query")
}

#[derive(Clone)]
pub struct VectorSearch {
    api: Arc<dyn ApiClient>,
}

impl VectorSearch {
    pub fn new(api: Arc<dyn ApiClient>) -> Self {
        Self { api }
    }

    /// Returns the response body untouched; some deployments report errors
    /// in a successful body via `error_code`, so interpretation is left to
    /// the caller.
    pub async fn query(&self, index: &str, query: &VectorQuery) -> Result<Value> {
        debug!(%index, num_results = query.num_results, "Querying vector index");
        let body = serde_json::to_value(query)?;
        self.api
            .request(Method::POST, &index_query_path(index), Some(body))
            .await
    }
}
