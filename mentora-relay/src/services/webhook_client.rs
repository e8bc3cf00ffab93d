//! HTTP invoker for automation engine webhooks
//!
//! One invocation makes at most two network attempts: the task's primary
//! endpoint, then its designated fallback. Each attempt carries its own
//! deadline, so a timeout aborts that attempt rather than the request and
//! the next endpoint is tried immediately.
//!
//! Parsing stays out of here. The invoker produces the raw JSON value the
//! engine returned, or a terminal failure naming the last endpoint and
//! failure class. It never touches the cache or the database.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::services::failover::{self, EndpointPair, EndpointRole, ExhaustedAttempts};
use crate::types::{RequestEncoding, SubjectId, TaskKind};

/// Failure classification for one webhook attempt
#[derive(Debug, Error)]
pub enum WebhookFailure {
    #[error("Request timed out")]
    Timeout,
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("HTTP error status: {0}")]
    HttpError(u16),
    #[error("Empty response body")]
    EmptyBody,
    #[error("Malformed JSON response: {0}")]
    MalformedJson(String),
}

impl WebhookFailure {
    fn outcome(&self) -> AttemptOutcome {
        match self {
            WebhookFailure::Timeout => AttemptOutcome::Timeout,
            WebhookFailure::Unreachable(_) => AttemptOutcome::TransportError,
            WebhookFailure::HttpError(_) => AttemptOutcome::HttpError,
            WebhookFailure::EmptyBody => AttemptOutcome::EmptyBody,
            WebhookFailure::MalformedJson(_) => AttemptOutcome::MalformedJson,
        }
    }
}

/// Terminal failure after primary and fallback were both exhausted
#[derive(Debug, Error)]
#[error("All {attempts} webhook attempts failed; last: {last_failure} ({last_role} endpoint)")]
pub struct InvokeError {
    pub attempts: u32,
    pub last_role: EndpointRole,
    pub last_failure: WebhookFailure,
}

impl From<ExhaustedAttempts<WebhookFailure>> for InvokeError {
    fn from(exhausted: ExhaustedAttempts<WebhookFailure>) -> Self {
        Self {
            attempts: exhausted.attempts,
            last_role: exhausted.last_role,
            last_failure: exhausted.last_error,
        }
    }
}

/// How one attempt ended, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Timeout,
    TransportError,
    HttpError,
    EmptyBody,
    MalformedJson,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Timeout => "timeout",
            AttemptOutcome::TransportError => "transport_error",
            AttemptOutcome::HttpError => "http_error",
            AttemptOutcome::EmptyBody => "empty_body",
            AttemptOutcome::MalformedJson => "malformed_json",
        }
    }
}

/// Transient record of one HTTP attempt
///
/// Never persisted; exists so retry decisions and log lines agree on what
/// happened.
#[derive(Debug, Clone)]
pub struct InvocationAttempt {
    pub endpoint_role: EndpointRole,
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

impl InvocationAttempt {
    fn record(
        endpoint_role: EndpointRole,
        attempt_number: u32,
        started_at: DateTime<Utc>,
        result: &Result<Value, WebhookFailure>,
    ) -> Self {
        let outcome = match result {
            Ok(_) => AttemptOutcome::Success,
            Err(failure) => failure.outcome(),
        };
        Self {
            endpoint_role,
            attempt_number,
            started_at,
            outcome,
        }
    }

    fn log(&self, task: TaskKind, url: &str) {
        let elapsed_ms = (Utc::now() - self.started_at).num_milliseconds();
        match self.outcome {
            AttemptOutcome::Success => debug!(
                task = %task,
                endpoint = %self.endpoint_role,
                attempt = self.attempt_number,
                elapsed_ms,
                url,
                "Webhook attempt succeeded"
            ),
            outcome => warn!(
                task = %task,
                endpoint = %self.endpoint_role,
                attempt = self.attempt_number,
                elapsed_ms,
                outcome = outcome.as_str(),
                url,
                "Webhook attempt failed"
            ),
        }
    }
}

/// HTTP client for the automation engine
pub struct WebhookClient {
    client: reqwest::Client,
}

impl WebhookClient {
    /// Build the shared HTTP client
    ///
    /// No client-wide timeout; each attempt sets its own per-task deadline.
    pub fn new() -> mentora_common::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mentora-relay/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                mentora_common::Error::Internal(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }

    /// Invoke the webhook for `task`, trying primary then fallback
    ///
    /// `fields` carries the task-specific request data; the subject id and
    /// a request timestamp are added to every payload. The deadline applies
    /// per attempt, so the worst case is twice `timeout` plus connect time.
    pub async fn invoke(
        &self,
        task: TaskKind,
        endpoints: &EndpointPair,
        timeout: Duration,
        subject: &SubjectId,
        fields: &Map<String, Value>,
    ) -> Result<Value, InvokeError> {
        let payload = build_payload(subject, fields);
        let encoding = task.request_encoding();

        failover::try_each(endpoints, |role, url, attempt_number| {
            let payload = &payload;
            async move {
                let started_at = Utc::now();
                let result = self.call_endpoint(url, encoding, timeout, payload).await;
                InvocationAttempt::record(role, attempt_number, started_at, &result)
                    .log(task, url);
                result
            }
        })
        .await
        .map(|(value, _role)| value)
        .map_err(InvokeError::from)
    }

    async fn call_endpoint(
        &self,
        url: &str,
        encoding: RequestEncoding,
        timeout: Duration,
        payload: &Value,
    ) -> Result<Value, WebhookFailure> {
        let request = match encoding {
            RequestEncoding::QueryParams => self.client.get(url).query(&query_pairs(payload)),
            RequestEncoding::JsonBody => self.client.post(url).json(payload),
        };

        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebhookFailure::HttpError(status.as_u16()));
        }

        let body = response.text().await.map_err(classify_transport_error)?;
        if body.trim().is_empty() {
            return Err(WebhookFailure::EmptyBody);
        }

        serde_json::from_str(&body).map_err(|e| WebhookFailure::MalformedJson(e.to_string()))
    }
}

fn classify_transport_error(error: reqwest::Error) -> WebhookFailure {
    if error.is_timeout() {
        WebhookFailure::Timeout
    } else {
        WebhookFailure::Unreachable(error.to_string())
    }
}

/// Assemble the upstream request payload
///
/// Field names (camelCase) follow the automation engine's workflow
/// contract.
fn build_payload(subject: &SubjectId, fields: &Map<String, Value>) -> Value {
    let mut payload = fields.clone();
    payload.insert(
        "subjectId".to_string(),
        Value::String(subject.as_str().to_string()),
    );
    payload.insert(
        "timestamp".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    Value::Object(payload)
}

/// Flatten a JSON object into query pairs for GET-style webhooks
fn query_pairs(payload: &Value) -> Vec<(String, String)> {
    match payload {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| (key.clone(), query_value(value)))
            .collect(),
        _ => Vec::new(),
    }
}

/// Strings go bare; everything else keeps its JSON rendering
fn query_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
