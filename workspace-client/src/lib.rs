pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod genie;
pub mod statements;
pub mod vector_search;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use client::{ApiClient, WorkspaceClient};
pub use config::{Credentials, WorkspaceConfig};
pub use error::{PlatformError, Result};
pub use genie::{
    Genie, GenieAnswer, GenieOutcome, PollPolicy, QueryTable, Sleeper, TokioSleeper,
};
pub use reqwest::Method;
pub use statements::{
    ExecuteStatementRequest, StatementExecution, StatementResponse, StatementState,
};
pub use vector_search::{VectorQuery, VectorSearch};
