//! Canonical result persistence
//!
//! The table is the single source of truth for computed results; the
//! in-memory cache in front of it may be cold at any time. All writes go
//! through the upsert functions here so the one-row-per-key invariant is
//! enforced by the UNIQUE constraint, never by check-then-act in
//! application code.

use chrono::{DateTime, Utc};
use mentora_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{CanonicalResult, NormalizedPayload};
use crate::types::{SubjectId, TaskKind};

const RESULT_COLUMNS: &str = r#"
    id, subject_id, task_kind, task_param, raw_payload, payload,
    status, revision, created_at, updated_at, expires_at
"#;

/// Insert or overwrite the result for a key
///
/// A concurrent insert for the same (subject_id, task_kind, task_param)
/// lands on the UNIQUE constraint and becomes an update: later successful
/// computations are authoritative, so last write wins and `revision` counts
/// the successful computations. The original row keeps its id and
/// created_at.
pub async fn upsert_completed(pool: &SqlitePool, result: &CanonicalResult) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO canonical_results (
            id, subject_id, task_kind, task_param, raw_payload, payload,
            status, revision, created_at, updated_at, expires_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?)
        ON CONFLICT(subject_id, task_kind, task_param) DO UPDATE SET
            raw_payload = excluded.raw_payload,
            payload = excluded.payload,
            status = excluded.status,
            revision = canonical_results.revision + 1,
            updated_at = excluded.updated_at,
            expires_at = excluded.expires_at
        "#,
    )
    .bind(result.id.to_string())
    .bind(result.subject.as_str())
    .bind(result.task.as_str())
    .bind(&result.parameter)
    .bind(raw_payload_json(result)?)
    .bind(result.payload.to_json()?)
    .bind(result.status.as_str())
    .bind(result.created_at.to_rfc3339())
    .bind(result.updated_at.to_rfc3339())
    .bind(result.expires_at.map(|t| t.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Record a fallback result only if the key has no row at all
///
/// A fallback is a stand-in, so it never replaces a real result. The row
/// exists for audit: it retains whatever unusable payload the engine sent.
/// It carries revision 0 so `revision` keeps counting successful
/// computations only.
pub async fn record_fallback(pool: &SqlitePool, result: &CanonicalResult) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO canonical_results (
            id, subject_id, task_kind, task_param, raw_payload, payload,
            status, revision, created_at, updated_at, expires_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
        ON CONFLICT(subject_id, task_kind, task_param) DO NOTHING
        "#,
    )
    .bind(result.id.to_string())
    .bind(result.subject.as_str())
    .bind(result.task.as_str())
    .bind(&result.parameter)
    .bind(raw_payload_json(result)?)
    .bind(result.payload.to_json()?)
    .bind(result.status.as_str())
    .bind(result.created_at.to_rfc3339())
    .bind(result.updated_at.to_rfc3339())
    .bind(result.expires_at.map(|t| t.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load the result for one key
pub async fn load_result(
    pool: &SqlitePool,
    subject: &SubjectId,
    task: TaskKind,
    parameter: &str,
) -> Result<Option<CanonicalResult>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {RESULT_COLUMNS}
        FROM canonical_results
        WHERE subject_id = ? AND task_kind = ? AND task_param = ?
        "#
    ))
    .bind(subject.as_str())
    .bind(task.as_str())
    .bind(parameter)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(result_from_row(&row)?)),
        None => Ok(None),
    }
}

/// All persisted results for one subject, newest first
pub async fn list_for_subject(
    pool: &SqlitePool,
    subject: &SubjectId,
) -> Result<Vec<CanonicalResult>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {RESULT_COLUMNS}
        FROM canonical_results
        WHERE subject_id = ?
        ORDER BY updated_at DESC, task_kind, task_param
        "#
    ))
    .bind(subject.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(result_from_row).collect()
}

/// Stored revision for one key, if any
///
/// Revisions count successful recomputations, which is what the retake
/// ceiling for attempt-limited tasks is measured against.
pub async fn revision_for_key(
    pool: &SqlitePool,
    subject: &SubjectId,
    task: TaskKind,
    parameter: &str,
) -> Result<Option<i64>> {
    let row = sqlx::query(
        r#"
        SELECT revision
        FROM canonical_results
        WHERE subject_id = ? AND task_kind = ? AND task_param = ?
        "#,
    )
    .bind(subject.as_str())
    .bind(task.as_str())
    .bind(parameter)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| row.get("revision")))
}

/// Number of rows stored for one key
///
/// The unique index makes this 0 or 1; anything else means the dedup
/// constraint is broken.
pub async fn count_for_key(
    pool: &SqlitePool,
    subject: &SubjectId,
    task: TaskKind,
    parameter: &str,
) -> Result<i64> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) as count
        FROM canonical_results
        WHERE subject_id = ? AND task_kind = ? AND task_param = ?
        "#,
    )
    .bind(subject.as_str())
    .bind(task.as_str())
    .bind(parameter)
    .fetch_one(pool)
    .await?;

    Ok(row.get("count"))
}

fn raw_payload_json(result: &CanonicalResult) -> Result<Option<String>> {
    result
        .raw_payload
        .as_ref()
        .map(|value| {
            serde_json::to_string(value)
                .map_err(|e| Error::Internal(format!("Failed to serialize raw payload: {}", e)))
        })
        .transpose()
}

fn result_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<CanonicalResult> {
    let id: String = row.get("id");
    let subject: String = row.get("subject_id");
    let task_kind: String = row.get("task_kind");
    let task: TaskKind = task_kind.parse()?;
    let status: String = row.get("status");
    let raw_payload: Option<String> = row.get("raw_payload");
    let payload: String = row.get("payload");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    let expires_at: Option<String> = row.get("expires_at");

    Ok(CanonicalResult {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Internal(format!("Invalid result id in database: {}", e)))?,
        subject: SubjectId::new(subject),
        task,
        parameter: row.get("task_param"),
        raw_payload: raw_payload
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| {
                    Error::Internal(format!("Invalid raw payload in database: {}", e))
                })
            })
            .transpose()?,
        payload: NormalizedPayload::from_stored(task, &payload)?,
        status: status.parse()?,
        revision: row.get("revision"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        expires_at: expires_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp in database: {}", e)))
}
