//! In-process doubles for the [`ApiClient`] and [`Sleeper`] seams.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use crate::{
    client::ApiClient,
    error::{PlatformError, Result},
    genie::Sleeper,
};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// Replays queued responses in order and records every request it receives.
/// An exhausted queue answers with an `InvalidResponse` error.
#[derive(Default)]
pub struct ScriptedApiClient {
    responses: Mutex<VecDeque<Result<Value>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedApiClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, body: Value) {
        self.push(Ok(body));
    }

    pub fn push_err(&self, error: PlatformError) {
        self.push(Err(error));
    }

    pub fn push(&self, response: Result<Value>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ApiClient for ScriptedApiClient {
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest {
                method,
                path: path.to_string(),
                body,
            });

        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Err(PlatformError::InvalidResponse(format!(
                    "no scripted response left for {path}"
                )))
            })
    }
}

/// Records requested sleeps without waiting.
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn total(&self) -> Duration {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}
