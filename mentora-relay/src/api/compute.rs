//! Compute endpoint, the platform's single entry point into the relay
//!
//! Accepts a (subject, task, parameter) request, delegates to the
//! orchestrator, and returns the normalized outcome. All degradation
//! decisions happen below this layer; the handler only maps transport.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};
use crate::services::orchestrator::{ComputeOutcome, ComputeRequest};
use crate::types::{SubjectId, TaskKind};
use crate::AppState;

/// POST /compute request body
#[derive(Debug, Deserialize)]
pub struct ComputeBody {
    /// Entity the computation targets
    pub subject_id: SubjectId,
    /// Task kind in kebab-case (e.g. "score-analysis")
    pub task: String,
    /// Task parameter (career name, module identifier); empty for
    /// per-subject singleton tasks
    #[serde(default)]
    pub parameter: Option<String>,
    /// Declared business attempt number for retake-style tasks
    #[serde(default)]
    pub attempt: Option<u32>,
    /// Skip the cache and recompute even if a fresh result exists
    #[serde(default)]
    pub force_regenerate: bool,
    /// Task-specific fields forwarded verbatim to the engine workflow
    #[serde(default)]
    pub fields: Option<Map<String, Value>>,
}

/// Handle POST /compute
pub async fn compute(
    State(state): State<AppState>,
    Json(body): Json<ComputeBody>,
) -> ApiResult<Json<ComputeOutcome>> {
    let task: TaskKind = body
        .task
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Unknown task kind: {}", body.task)))?;

    let request = ComputeRequest {
        subject: body.subject_id,
        task,
        parameter: body.parameter.unwrap_or_default(),
        fields: body.fields.unwrap_or_default(),
        attempt: body.attempt,
        force_regenerate: body.force_regenerate,
    };

    let outcome = state.relay.compute(request).await?;
    Ok(Json(outcome))
}

/// Build compute routes
pub fn compute_routes() -> Router<AppState> {
    Router::new().route("/compute", post(compute))
}
