use futures::future::{AbortRegistration, Abortable};
use futures::StreamExt;

use crate::stream::MentorStream;
use crate::types::MentorRequest;
use crate::{MentorError, Result};

/// Shown in place of the assistant's reply when a turn fails.
pub const APOLOGY: &str =
    "Sorry, I couldn't reach the mentor just now. Please try asking again in a moment.";

// ─── TurnOutcome ──────────────────────────────────────────────────────────

/// How one question/answer turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed(String),
    /// The learner moved on (sent another message or closed the panel).
    /// Not an error.
    Aborted,
    /// The request or stream failed; `apology` replaces the reply.
    Failed { apology: String, error: String },
}

// ─── MentorClient ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MentorClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl MentorClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: None,
        }
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST the request and return the streaming reply.
    ///
    /// Fails before streaming starts on connection errors and non-2xx
    /// statuses; later transport errors arrive as stream items.
    pub async fn stream(&self, request: &MentorRequest) -> Result<MentorStream> {
        let body = serde_json::to_vec(request)?;
        let mut req = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .body(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MentorError::Status {
                status: status.as_u16(),
                body,
            });
        }
        tracing::debug!(endpoint = %self.endpoint, "mentor stream opened");
        Ok(MentorStream::new(response))
    }

    /// Run one turn to completion, calling `on_fragment` as text arrives.
    ///
    /// Triggering the [`futures::future::AbortHandle`] paired with `abort`
    /// stops the turn and yields [`TurnOutcome::Aborted`]; the connection is
    /// dropped.
    pub async fn ask<F>(
        &self,
        request: &MentorRequest,
        abort: AbortRegistration,
        on_fragment: F,
    ) -> TurnOutcome
    where
        F: FnMut(&str),
    {
        let mut on_fragment = on_fragment;
        let turn = async {
            let mut stream = self.stream(request).await?;
            let mut text = String::new();
            while let Some(fragment) = stream.next().await {
                let fragment = fragment?;
                on_fragment(&fragment);
                text.push_str(&fragment);
            }
            Ok::<_, MentorError>(text)
        };

        match Abortable::new(turn, abort).await {
            Err(_aborted) => {
                tracing::debug!("mentor turn aborted");
                TurnOutcome::Aborted
            }
            Ok(Ok(text)) => TurnOutcome::Completed(text),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "mentor turn failed");
                TurnOutcome::Failed {
                    apology: APOLOGY.to_string(),
                    error: e.to_string(),
                }
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
