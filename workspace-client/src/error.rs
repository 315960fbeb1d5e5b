use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Platform not configured: {0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{error_code} ({status}): {message}")]
    Api {
        status: u16,
        error_code: String,
        message: String,
    },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlatformError>;
