use crate::error::{PlatformError, Result};

/// How the client authenticates against the workspace.
#[derive(Clone)]
pub enum Credentials {
    /// Personal access token, sent as-is.
    Token(String),
    /// Service principal, exchanged for short-lived tokens.
    OAuth {
        client_id: String,
        client_secret: String,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Token(_) => f.write_str("Credentials::Token(***)"),
            Credentials::OAuth { client_id, .. } => f
                .debug_struct("Credentials::OAuth")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    pub host: String,
    pub credentials: Credentials,
}

impl WorkspaceConfig {
    pub fn new(host: impl AsRef<str>, credentials: Credentials) -> Self {
        Self {
            host: normalize_host(host.as_ref()),
            credentials,
        }
    }

    /// Reads `DATABRICKS_HOST` plus either OAuth client credentials or a
    /// personal access token. OAuth wins when both are present.
    pub fn from_env() -> Result<Self> {
        let host = non_empty_var("DATABRICKS_HOST").ok_or_else(|| {
            PlatformError::Configuration("DATABRICKS_HOST is not set".to_string())
        })?;

        let credentials = match (
            non_empty_var("DATABRICKS_CLIENT_ID"),
            non_empty_var("DATABRICKS_CLIENT_SECRET"),
        ) {
            (Some(client_id), Some(client_secret)) => Credentials::OAuth {
                client_id,
                client_secret,
            },
            _ => non_empty_var("DATABRICKS_TOKEN")
                .map(Credentials::Token)
                .ok_or_else(|| {
                    PlatformError::Configuration(
                        "set DATABRICKS_CLIENT_ID/DATABRICKS_CLIENT_SECRET or DATABRICKS_TOKEN"
                            .to_string(),
                    )
                })?,
        };

        Ok(Self::new(host, credentials))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Prefixes `https://` when the scheme is missing and strips trailing slashes.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}
