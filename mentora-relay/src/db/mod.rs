//! Database access for mentora-relay

pub mod results;

use mentora_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool and relay tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let pool = mentora_common::db::open_pool(db_path).await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create relay tables if they don't exist
///
/// The uniqueness constraint on (subject_id, task_kind, task_param) is what
/// keeps concurrent writers from producing duplicate rows; application code
/// relies on it rather than re-checking before insert.
async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS canonical_results (
            id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL,
            task_kind TEXT NOT NULL,
            task_param TEXT NOT NULL DEFAULT '',
            raw_payload TEXT,
            payload TEXT NOT NULL,
            status TEXT NOT NULL,
            revision INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            expires_at TEXT,
            UNIQUE(subject_id, task_kind, task_param)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_canonical_results_subject
        ON canonical_results(subject_id)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (canonical_results)");

    Ok(())
}
