//! Genie conversational query API.
//!
//! A question starts a conversation, after which the message is polled until
//! it reaches a terminal status. Polling is bounded by [`PollPolicy`] and the
//! wait between polls goes through a [`Sleeper`] so tests never block.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use crate::{client::ApiClient, error::Result, statements::StatementResponse};

pub const STATUS_COMPLETED: &str = "COMPLETED";
pub const STATUS_FAILED: &str = "FAILED";
pub const STATUS_CANCELLED: &str = "CANCELLED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 30,
        }
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartConversationResponse {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextAttachment {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryAttachment {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attachment_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub text: Option<TextAttachment>,
    #[serde(default)]
    pub query: Option<QueryAttachment>,
}

impl Attachment {
    fn query_attachment_id(&self) -> Option<&str> {
        self.query
            .as_ref()
            .and_then(|q| q.attachment_id.as_deref())
            .or(self.attachment_id.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenieMessage {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GenieAnswer {
    pub conversation_id: String,
    pub message_id: String,
    /// False when the message completed without any attachment.
    pub has_attachment: bool,
    pub text: Option<String>,
    pub sql: Option<String>,
    pub table: Option<QueryTable>,
    /// Set when the SQL ran but its rows could not be fetched.
    pub result_warning: Option<String>,
}

#[derive(Debug, Clone)]
pub enum GenieOutcome {
    Completed(GenieAnswer),
    Failed { error: Value },
    Cancelled,
    TimedOut { attempts: u32 },
    /// The start call answered without conversation or message ids.
    StartFailed,
}

#[derive(Clone)]
pub struct Genie {
    api: Arc<dyn ApiClient>,
    space_id: String,
}

impl Genie {
    pub fn new(api: Arc<dyn ApiClient>, space_id: impl Into<String>) -> Self {
        Self {
            api,
            space_id: space_id.into(),
        }
    }

    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    fn space_path(&self) -> String {
        format!("/api/2.0/genie/spaces/{}", self.space_id)
    }

    fn message_path(&self, conversation_id: &str, message_id: &str) -> String {
        format!(
            "{}/conversations/{conversation_id}/messages/{message_id}",
            self.space_path()
        )
    }

    pub async fn start_conversation(&self, question: &str) -> Result<StartConversationResponse> {
        let response = self
            .api
            .request(
                Method::POST,
                &format!("{}/start-conversation", self.space_path()),
                Some(json!({ "content": question })),
            )
            .await?;
        Ok(serde_json::from_value(response)?)
    }

    pub async fn get_message(&self, conversation_id: &str, message_id: &str) -> Result<GenieMessage> {
        let response = self
            .api
            .request(
                Method::GET,
                &self.message_path(conversation_id, message_id),
                None,
            )
            .await?;
        Ok(serde_json::from_value(response)?)
    }

    pub async fn get_query_result(
        &self,
        conversation_id: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Value> {
        self.api
            .request(
                Method::GET,
                &format!(
                    "{}/query-result/{attachment_id}",
                    self.message_path(conversation_id, message_id)
                ),
                None,
            )
            .await
    }

    /// Asks a question and waits for a terminal status.
    ///
    /// Each attempt sleeps `policy.interval` before polling; after
    /// `policy.max_attempts` non-terminal polls the outcome is `TimedOut`.
    pub async fn ask(
        &self,
        question: &str,
        policy: PollPolicy,
        sleeper: &dyn Sleeper,
    ) -> Result<GenieOutcome> {
        let started = self.start_conversation(question).await?;
        let (conversation_id, message_id) = match (started.conversation_id, started.message_id) {
            (Some(c), Some(m)) if !c.is_empty() && !m.is_empty() => (c, m),
            _ => {
                warn!(space_id = %self.space_id, "Genie start-conversation returned no ids");
                return Ok(GenieOutcome::StartFailed);
            }
        };

        info!(
            space_id = %self.space_id,
            %conversation_id,
            %message_id,
            "Genie conversation started"
        );

        for attempt in 1..=policy.max_attempts {
            sleeper.sleep(policy.interval).await;

            let message = self.get_message(&conversation_id, &message_id).await?;
            let status = message
                .status
                .clone()
                .unwrap_or_else(|| "UNKNOWN".to_string());
            debug!(attempt, %status, "Polled Genie message");

            match status.as_str() {
                STATUS_COMPLETED => {
                    let answer = self
                        .collect_answer(conversation_id, message_id, message)
                        .await;
                    return Ok(GenieOutcome::Completed(answer));
                }
                STATUS_FAILED => {
                    return Ok(GenieOutcome::Failed {
                        error: message.error.unwrap_or_else(|| json!({})),
                    });
                }
                STATUS_CANCELLED => return Ok(GenieOutcome::Cancelled),
                _ => {}
            }
        }

        warn!(
            attempts = policy.max_attempts,
            "Genie message did not reach a terminal status"
        );
        Ok(GenieOutcome::TimedOut {
            attempts: policy.max_attempts,
        })
    }

    async fn collect_answer(
        &self,
        conversation_id: String,
        message_id: String,
        message: GenieMessage,
    ) -> GenieAnswer {
        let mut answer = GenieAnswer {
            conversation_id,
            message_id,
            ..Default::default()
        };

        let Some(attachment) = message.attachments.into_iter().next() else {
            return answer;
        };
        answer.has_attachment = true;
        answer.text = attachment
            .text
            .as_ref()
            .map(|t| t.content.clone())
            .filter(|t| !t.is_empty());
        answer.sql = attachment
            .query
            .as_ref()
            .map(|q| q.query.clone())
            .filter(|q| !q.is_empty());

        if answer.sql.is_none() {
            return answer;
        }

        let Some(attachment_id) = attachment.query_attachment_id() else {
            return answer;
        };

        match self
            .get_query_result(&answer.conversation_id, &answer.message_id, attachment_id)
            .await
        {
            Ok(body) => match body.get("statement_response").cloned() {
                Some(statement) if !statement.is_null() => {
                    match serde_json::from_value::<StatementResponse>(statement) {
                        Ok(statement) => {
                            let columns = statement.column_names();
                            let rows = statement.rows().to_vec();
                            if !columns.is_empty() && !rows.is_empty() {
                                answer.table = Some(QueryTable { columns, rows });
                            }
                        }
                        Err(e) => {
                            answer.result_warning =
                                Some(format!("Could not fetch query results: {e}"));
                        }
                    }
                }
                _ => {
                    answer.result_warning =
                        Some("No statement_response in query result".to_string());
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to fetch Genie query result");
                answer.result_warning = Some(format!("Could not fetch query results: {e}"));
            }
        }

        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSleeper, ScriptedApiClient};

    fn start_ok() -> Value {
        json!({ "conversation_id": "conv-1", "message_id": "msg-1" })
    }

    #[tokio::test]
    async fn test_ask_completes_with_table() {
        let api = Arc::new(ScriptedApiClient::new());
        api.push_ok(start_ok());
        api.push_ok(json!({ "status": "EXECUTING_QUERY" }));
        api.push_ok(json!({
            "status": "COMPLETED",
            "attachments": [{
                "text": { "content": "There are 2 fraud types." },
                "query": { "query": "SELECT fraud_type, COUNT(*) FROM t GROUP BY 1", "attachment_id": "att-9" }
            }]
        }));
        api.push_ok(json!({
            "statement_response": {
                "status": { "state": "SUCCEEDED" },
                "manifest": { "schema": { "columns": [ { "name": "fraud_type" }, { "name": "count" } ] } },
                "result": { "data_array": [ ["Upcoding", "4"], ["Phantom Billing", "2"] ] }
            }
        }));

        let sleeper = RecordingSleeper::new();
        let genie = Genie::new(api.clone(), "space-1");
        let outcome = genie
            .ask("Which fraud types?", PollPolicy::default(), &sleeper)
            .await
            .unwrap();

        let GenieOutcome::Completed(answer) = outcome else {
            panic!("expected completed outcome");
        };
        assert_eq!(answer.text.as_deref(), Some("There are 2 fraud types."));
        assert!(answer.sql.unwrap().starts_with("SELECT fraud_type"));
        let table = answer.table.unwrap();
        assert_eq!(table.columns, vec!["fraud_type", "count"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(sleeper.calls(), 2);

        let requests = api.requests();
        assert_eq!(requests[0].path, "/api/2.0/genie/spaces/space-1/start-conversation");
        assert_eq!(requests[0].body, Some(json!({ "content": "Which fraud types?" })));
        assert!(requests[3].path.ends_with("/messages/msg-1/query-result/att-9"));
    }

    #[tokio::test]
    async fn test_ask_times_out_after_attempt_ceiling() {
        let api = Arc::new(ScriptedApiClient::new());
        api.push_ok(start_ok());
        for _ in 0..30 {
            api.push_ok(json!({ "status": "EXECUTING_QUERY" }));
        }

        let sleeper = RecordingSleeper::new();
        let outcome = Genie::new(api.clone(), "space-1")
            .ask("slow question", PollPolicy::default(), &sleeper)
            .await
            .unwrap();

        assert!(matches!(outcome, GenieOutcome::TimedOut { attempts: 30 }));
        assert_eq!(sleeper.calls(), 30);
        assert_eq!(sleeper.total(), Duration::from_secs(60));
        assert_eq!(api.requests().len(), 31);
    }

    #[tokio::test]
    async fn test_ask_reports_failed_and_cancelled() {
        let api = Arc::new(ScriptedApiClient::new());
        api.push_ok(start_ok());
        api.push_ok(json!({ "status": "FAILED", "error": { "error": "bad sql" } }));
        let outcome = Genie::new(api, "s")
            .ask("q", PollPolicy::default(), &RecordingSleeper::new())
            .await
            .unwrap();
        match outcome {
            GenieOutcome::Failed { error } => assert_eq!(error["error"], "bad sql"),
            other => panic!("unexpected outcome {other:?}"),
        }

        let api = Arc::new(ScriptedApiClient::new());
        api.push_ok(start_ok());
        api.push_ok(json!({ "status": "CANCELLED" }));
        let outcome = Genie::new(api, "s")
            .ask("q", PollPolicy::default(), &RecordingSleeper::new())
            .await
            .unwrap();
        assert!(matches!(outcome, GenieOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_ask_without_ids_is_start_failure() {
        let api = Arc::new(ScriptedApiClient::new());
        api.push_ok(json!({ "conversation_id": "conv-1" }));
        let sleeper = RecordingSleeper::new();
        let outcome = Genie::new(api, "s")
            .ask("q", PollPolicy::default(), &sleeper)
            .await
            .unwrap();
        assert!(matches!(outcome, GenieOutcome::StartFailed));
        assert_eq!(sleeper.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_statement_response_becomes_warning() {
        let api = Arc::new(ScriptedApiClient::new());
        api.push_ok(start_ok());
        api.push_ok(json!({
            "status": "COMPLETED",
            "attachments": [{ "attachment_id": "att-1", "query": { "query": "SELECT 1" } }]
        }));
        api.push_ok(json!({}));

        let outcome = Genie::new(api, "s")
            .ask("q", PollPolicy::default(), &RecordingSleeper::new())
            .await
            .unwrap();
        let GenieOutcome::Completed(answer) = outcome else {
            panic!("expected completed outcome");
        };
        assert!(answer.table.is_none());
        assert_eq!(
            answer.result_warning.as_deref(),
            Some("No statement_response in query result")
        );
    }
}
