//! Persisted canonical result listing
//!
//! Read-only audit view over the canonical_results table. Payloads are
//! deliberately not exposed here; callers that need content go through
//! POST /compute so cache and expiry policy stay in one code path.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db;
use crate::error::ApiResult;
use crate::models::{CanonicalResult, ResultStatus};
use crate::types::{SubjectId, TaskKind};
use crate::AppState;

/// One canonical row in the audit listing
#[derive(Debug, Serialize)]
pub struct ResultSummary {
    pub id: Uuid,
    pub task: TaskKind,
    pub parameter: String,
    pub status: ResultStatus,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// True when expires_at lies in the past at read time
    pub expired: bool,
}

impl From<CanonicalResult> for ResultSummary {
    fn from(result: CanonicalResult) -> Self {
        let expired = result.is_expired(Utc::now());
        Self {
            id: result.id,
            task: result.task,
            parameter: result.parameter,
            status: result.status,
            revision: result.revision,
            created_at: result.created_at,
            updated_at: result.updated_at,
            expires_at: result.expires_at,
            expired,
        }
    }
}

/// GET /results/{subject_id} response
#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub subject_id: SubjectId,
    pub results: Vec<ResultSummary>,
}

/// Handle GET /results/{subject_id}
pub async fn list_results(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> ApiResult<Json<ResultsResponse>> {
    let subject = SubjectId::new(subject_id);
    let rows = db::results::list_for_subject(&state.db, &subject).await?;

    Ok(Json(ResultsResponse {
        subject_id: subject,
        results: rows.into_iter().map(ResultSummary::from).collect(),
    }))
}

/// Build result listing routes
pub fn results_routes() -> Router<AppState> {
    Router::new().route("/results/:subject_id", get(list_results))
}
