//! Computation orchestrator
//!
//! Entry point for every remote computation. Per request:
//!
//! ```text
//! validate subject
//!   -> cache fast path (force_regenerate or a declared attempt skips it)
//!   -> retake ceiling check, for attempt-limited tasks
//!   -> cache eviction for the entry a recompute skipped
//!   -> invoke webhook (primary, then fallback endpoint)
//!   -> normalize
//!   -> persist through the upsert guard (per task policy)
//!   -> cache put (per task policy)
//! ```
//!
//! The ceiling check precedes the eviction, so a refused recompute leaves
//! the cached entry servable. Invoker and normalizer failures never
//! propagate: the caller receives the task's deterministic fallback payload
//! with `fallback = true`, cached only where the task policy opts in and
//! never overwriting a persisted result. Only policy violations (retake
//! ceiling) and programmer input errors (blank subject) surface as errors.

use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::db;
use crate::models::{CanonicalResult, NormalizedPayload, ResultStatus};
use crate::services::normalizer;
use crate::services::result_cache::ResultCache;
use crate::services::webhook_client::WebhookClient;
use crate::types::{SubjectId, TaskKind};

/// Errors surfaced to callers of [`ComputeOrchestrator::compute`]
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Subject id must not be blank")]
    InvalidSubject,
    #[error("Retake limit of {limit} attempts reached")]
    RetakeLimit { limit: u32 },
    #[error("Database error: {0}")]
    Database(#[from] mentora_common::Error),
}

/// One computation request
#[derive(Debug, Clone)]
pub struct ComputeRequest {
    pub subject: SubjectId,
    pub task: TaskKind,
    /// Secondary key; empty means the subject's singleton artifact
    pub parameter: String,
    /// Task-specific fields forwarded to the engine verbatim
    pub fields: Map<String, Value>,
    /// Caller-declared business attempt number (assessment retakes);
    /// implies a fresh computation
    pub attempt: Option<u32>,
    pub force_regenerate: bool,
}

impl ComputeRequest {
    pub fn new(subject: SubjectId, task: TaskKind) -> Self {
        Self {
            subject,
            task,
            parameter: String::new(),
            fields: Map::new(),
            attempt: None,
            force_regenerate: false,
        }
    }
}

/// What the caller gets back whenever no policy or input error occurred
#[derive(Debug, Clone, Serialize)]
pub struct ComputeOutcome {
    /// Kept for response-shape stability; failures surface as errors instead
    pub success: bool,
    pub result: NormalizedPayload,
    /// Served from cache without touching the engine
    pub cached: bool,
    /// Result is the deterministic per-task default, not engine output
    pub fallback: bool,
}

/// Composes cache, invoker, normalizer, and persistence
///
/// All endpoint and policy configuration is injected here at construction;
/// request handling reads nothing ambient.
pub struct ComputeOrchestrator {
    db: SqlitePool,
    engine: EngineConfig,
    cache: ResultCache,
    client: WebhookClient,
}

impl ComputeOrchestrator {
    pub fn new(db: SqlitePool, engine: EngineConfig) -> mentora_common::Result<Self> {
        Ok(Self {
            db,
            engine,
            cache: ResultCache::new(),
            client: WebhookClient::new()?,
        })
    }

    /// Compute (or serve) the canonical result for one key
    pub async fn compute(&self, request: ComputeRequest) -> Result<ComputeOutcome, RelayError> {
        if request.subject.is_blank() {
            return Err(RelayError::InvalidSubject);
        }

        let ComputeRequest {
            subject,
            task,
            parameter,
            mut fields,
            attempt,
            force_regenerate,
        } = request;

        // A declared attempt is a fresh computation by definition; so is an
        // explicit force. Everything else is eligible for the fast path.
        let recompute = force_regenerate || attempt.is_some();
        if !recompute {
            if let Some(hit) = self.cache.get(&subject, task, &parameter).await {
                debug!(subject = %subject, task = %task, "Cache hit");
                return Ok(ComputeOutcome {
                    success: true,
                    cached: true,
                    fallback: hit.status == ResultStatus::Fallback,
                    result: hit.payload,
                });
            }
        }

        // Ceiling before eviction: a refused recompute leaves the cached
        // entry servable.
        self.check_retake_ceiling(&subject, task, &parameter, attempt)
            .await?;

        if recompute {
            self.cache.invalidate(&subject, task, &parameter).await;
        }

        merge_request_fields(task, &parameter, attempt, &mut fields);

        let endpoints = self.engine.endpoints_for(task);
        let timeout = self.engine.timeout_for(task);

        let raw = match self
            .client
            .invoke(task, &endpoints, timeout, &subject, &fields)
            .await
        {
            Ok(raw) => raw,
            Err(error) => {
                warn!(
                    subject = %subject,
                    task = %task,
                    %error,
                    "Webhook attempts exhausted; serving deterministic fallback"
                );
                let mut payload = normalizer::fallback_payload(task);
                fill_plan_career(&mut payload, &parameter);
                if self.engine.cache_fallbacks_for(task) {
                    if let Some(ttl) = self.engine.cache_ttl_for(task) {
                        let record = CanonicalResult::fallback(
                            subject,
                            task,
                            parameter,
                            None,
                            payload.clone(),
                        );
                        self.cache.put(record, ttl).await;
                    }
                }
                // Never persisted: once nothing cached remains, the next
                // request retries the engine.
                return Ok(ComputeOutcome {
                    success: true,
                    cached: false,
                    fallback: true,
                    result: payload,
                });
            }
        };

        let mut normalized = normalizer::normalize(task, &raw);
        fill_plan_career(&mut normalized.payload, &parameter);
        if normalized.fallback {
            return self
                .complete_with_fallback(subject, task, parameter, raw, normalized.payload)
                .await;
        }

        let result = CanonicalResult::completed(
            subject,
            task,
            parameter,
            raw,
            normalized.payload,
            self.engine.cache_ttl_for(task),
        );

        if task.persists_results() {
            db::results::upsert_completed(&self.db, &result).await?;
        }
        if let Some(ttl) = self.engine.cache_ttl_for(task) {
            self.cache.put(result.clone(), ttl).await;
        }

        info!(subject = %result.subject, task = %task, "Computed canonical result");
        Ok(ComputeOutcome {
            success: true,
            cached: false,
            fallback: false,
            result: result.payload,
        })
    }

    /// Explicit cache eviction; reports whether an entry was present
    pub async fn invalidate(&self, subject: &SubjectId, task: TaskKind, parameter: &str) -> bool {
        self.cache.invalidate(subject, task, parameter).await
    }

    /// Live cache entry count, reported by the health endpoint
    pub async fn cached_entries(&self) -> usize {
        self.cache.entry_count().await
    }

    /// The engine answered but nothing in the response was usable
    ///
    /// An audit row retains the unrecognized payload (it never replaces a
    /// completed result), and the deterministic fallback goes to the caller.
    async fn complete_with_fallback(
        &self,
        subject: SubjectId,
        task: TaskKind,
        parameter: String,
        raw: Value,
        payload: NormalizedPayload,
    ) -> Result<ComputeOutcome, RelayError> {
        warn!(
            subject = %subject,
            task = %task,
            "No recognizable shape in engine response; serving fallback"
        );

        let record = CanonicalResult::fallback(subject, task, parameter, Some(raw), payload);
        if task.persists_results() {
            db::results::record_fallback(&self.db, &record).await?;
        }
        if self.engine.cache_fallbacks_for(task) {
            if let Some(ttl) = self.engine.cache_ttl_for(task) {
                self.cache.put(record.clone(), ttl).await;
            }
        }

        Ok(ComputeOutcome {
            success: true,
            cached: false,
            fallback: true,
            result: record.payload,
        })
    }

    /// Attempt-limited tasks refuse recomputation beyond their ceiling
    ///
    /// The stored revision counts successful computations, so it stands in
    /// when the caller does not declare an attempt number outright.
    async fn check_retake_ceiling(
        &self,
        subject: &SubjectId,
        task: TaskKind,
        parameter: &str,
        attempt: Option<u32>,
    ) -> Result<(), RelayError> {
        let Some(limit) = task.max_attempts() else {
            return Ok(());
        };

        let prior = db::results::revision_for_key(&self.db, subject, task, parameter)
            .await?
            .unwrap_or(0);
        let this_attempt = attempt.map(i64::from).unwrap_or(prior + 1);

        if this_attempt > i64::from(limit) {
            info!(
                subject = %subject,
                task = %task,
                attempt = this_attempt,
                limit,
                "Retake ceiling reached"
            );
            return Err(RelayError::RetakeLimit { limit });
        }
        Ok(())
    }
}

/// Learning plans carry the career they were generated for; the engine
/// often returns bare plan text, so the request parameter backfills it
fn fill_plan_career(payload: &mut NormalizedPayload, parameter: &str) {
    if let NormalizedPayload::Path(plan) = payload {
        if plan.career.is_empty() && !parameter.is_empty() {
            plan.career = parameter.to_string();
        }
    }
}

/// Fold the key parameter and attempt number into the webhook fields
///
/// Explicit caller-provided fields win over the derived ones.
fn merge_request_fields(
    task: TaskKind,
    parameter: &str,
    attempt: Option<u32>,
    fields: &mut Map<String, Value>,
) {
    if !parameter.is_empty() {
        if let Some(field) = task.parameter_field() {
            fields
                .entry(field.to_string())
                .or_insert_with(|| Value::String(parameter.to_string()));
        }
    }
    if let Some(attempt) = attempt {
        fields
            .entry("attempt".to_string())
            .or_insert_with(|| Value::Number(attempt.into()));
    }
}
