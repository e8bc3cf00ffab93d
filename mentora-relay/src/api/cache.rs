//! Cache invalidation endpoint for operator tooling

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::types::{SubjectId, TaskKind};
use crate::AppState;

/// POST /cache/invalidate request body
#[derive(Debug, Deserialize)]
pub struct InvalidateBody {
    pub subject_id: SubjectId,
    /// Task kind in kebab-case
    pub task: String,
    #[serde(default)]
    pub parameter: Option<String>,
}

/// POST /cache/invalidate response
#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    /// Whether an entry was actually present and removed
    pub evicted: bool,
}

/// Handle POST /cache/invalidate
pub async fn invalidate_cache(
    State(state): State<AppState>,
    Json(body): Json<InvalidateBody>,
) -> ApiResult<Json<InvalidateResponse>> {
    let task: TaskKind = body
        .task
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Unknown task kind: {}", body.task)))?;

    let evicted = state
        .relay
        .invalidate(&body.subject_id, task, body.parameter.as_deref().unwrap_or_default())
        .await;

    Ok(Json(InvalidateResponse { evicted }))
}

/// Build cache management routes
pub fn cache_routes() -> Router<AppState> {
    Router::new().route("/cache/invalidate", post(invalidate_cache))
}
