//! Canonical result: the normalized, persisted outcome of one computation
//!
//! At most one row exists per (subject, task, parameter). Later successful
//! computations overwrite in place; `revision` counts the overwrites so
//! operators can see churn without a version-history table.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use mentora_common::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::models::NormalizedPayload;
use crate::types::{SubjectId, TaskKind};

/// Lifecycle status of a canonical result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// Row reserved, computation not finished (never served from cache)
    Pending,
    /// Normal outcome of a successful computation
    Completed,
    /// Computation failed terminally (never cached, so the next request retries)
    Failed,
    /// Deterministic locally-produced substitute for an unusable upstream response
    Fallback,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Pending => "pending",
            ResultStatus::Completed => "completed",
            ResultStatus::Failed => "failed",
            ResultStatus::Fallback => "fallback",
        }
    }

    /// Only settled, usable results may be served from cache
    pub fn is_servable(&self) -> bool {
        matches!(self, ResultStatus::Completed | ResultStatus::Fallback)
    }
}

impl FromStr for ResultStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ResultStatus::Pending),
            "completed" => Ok(ResultStatus::Completed),
            "failed" => Ok(ResultStatus::Failed),
            "fallback" => Ok(ResultStatus::Fallback),
            other => Err(Error::Internal(format!("Unknown result status: {}", other))),
        }
    }
}

/// Normalized, persisted outcome of one remote computation
#[derive(Debug, Clone)]
pub struct CanonicalResult {
    pub id: Uuid,
    pub subject: SubjectId,
    pub task: TaskKind,
    /// Secondary key component; empty string means singleton per subject
    pub parameter: String,
    /// Upstream response exactly as received, retained for audit
    pub raw_payload: Option<Value>,
    pub payload: NormalizedPayload,
    pub status: ResultStatus,
    /// Starts at 1; bumped on every overwrite of the same key
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CanonicalResult {
    /// Build a completed result from a normalized upstream response
    pub fn completed(
        subject: SubjectId,
        task: TaskKind,
        parameter: String,
        raw_payload: Value,
        payload: NormalizedPayload,
        ttl: Option<Duration>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            subject,
            task,
            parameter,
            raw_payload: Some(raw_payload),
            payload,
            status: ResultStatus::Completed,
            revision: 1,
            created_at: now,
            updated_at: now,
            expires_at: ttl.map(|t| now + ChronoDuration::from_std(t).unwrap_or_default()),
        }
    }

    /// Build a fallback result for an upstream response with no usable shape
    ///
    /// The unrecognized raw payload is kept so operators can inspect what the
    /// engine actually sent.
    pub fn fallback(
        subject: SubjectId,
        task: TaskKind,
        parameter: String,
        raw_payload: Option<Value>,
        payload: NormalizedPayload,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            subject,
            task,
            parameter,
            raw_payload,
            payload,
            status: ResultStatus::Fallback,
            revision: 1,
            created_at: now,
            updated_at: now,
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => now > expires,
            None => false,
        }
    }
}
