use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    auth::TokenProvider,
    config::WorkspaceConfig,
    error::{PlatformError, Result},
};

/// Upper bound on a single HTTP exchange. Statement waits are capped at 50s
/// server-side, so this leaves headroom for the response itself.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Raw JSON access to the workspace REST API.
///
/// Everything else in this crate is written against this trait so callers can
/// swap the HTTP transport for a scripted one in tests.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value>;
}

pub struct WorkspaceClient {
    host: String,
    http: reqwest::Client,
    tokens: TokenProvider,
}

impl WorkspaceClient {
    pub fn new(config: WorkspaceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            tokens: TokenProvider::new(config.host.clone(), config.credentials),
            host: config.host,
            http,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(WorkspaceConfig::from_env()?)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Bearer token for calls made outside this client, e.g. model serving.
    pub async fn access_token(&self) -> Result<String> {
        self.tokens.token(&self.http).await
    }
}

#[async_trait]
impl ApiClient for WorkspaceClient {
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.host, path);
        debug!(%method, %path, "Calling workspace API");

        let mut request = self.http.request(method.clone(), &url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let body: Value = if text.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&text).map_err(|e| {
                PlatformError::InvalidResponse(format!("{method} {path}: {e}"))
            })?
        };

        if !status.is_success() {
            let error_code = body
                .get("error_code")
                .and_then(Value::as_str)
                .unwrap_or("HTTP_ERROR")
                .to_string();
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or(text.as_str())
                .to_string();
            warn!(%method, %path, status = status.as_u16(), %error_code, "Workspace API error");
            return Err(PlatformError::Api {
                status: status.as_u16(),
                error_code,
                message,
            });
        }

        Ok(body)
    }
}
