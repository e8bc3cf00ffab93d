//! In-memory result cache
//!
//! Serves previously computed results without re-invoking the automation
//! engine. Keyed by (subject, task, parameter) with a per-task TTL.
//!
//! The cache is a looser-consistency layer over the database: it starts
//! cold on restart and a miss simply triggers recomputation, so correctness
//! never depends on it. Uses RwLock for concurrent read access with rare
//! writes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::models::CanonicalResult;
use crate::types::{SubjectId, TaskKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    subject: SubjectId,
    task: TaskKind,
    parameter: String,
}

impl CacheKey {
    fn new(subject: &SubjectId, task: TaskKind, parameter: &str) -> Self {
        Self {
            subject: subject.clone(),
            task,
            parameter: parameter.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: CanonicalResult,
    expires_at: Instant,
}

/// Concurrent map of (subject, task, parameter) to cached results
#[derive(Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached result, evicting it if its TTL has lapsed
    pub async fn get(
        &self,
        subject: &SubjectId,
        task: TaskKind,
        parameter: &str,
    ) -> Option<CanonicalResult> {
        let key = CacheKey::new(subject, task, parameter);

        {
            let entries = self.entries.read().await;
            match entries.get(&key) {
                None => return None,
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.result.clone())
                }
                Some(_) => {}
            }
        }

        // Expired: re-check under the write lock in case a concurrent
        // writer refreshed the entry in the meantime.
        let mut entries = self.entries.write().await;
        match entries.get(&key) {
            Some(entry) if entry.expires_at <= Instant::now() => {
                entries.remove(&key);
                debug!(subject = %key.subject, task = %key.task, "Evicted expired cache entry");
                None
            }
            Some(entry) => Some(entry.result.clone()),
            None => None,
        }
    }

    /// Insert or refresh a cached result
    ///
    /// Only completed and fallback results are accepted. Failed or pending
    /// results are dropped so the next request goes back to the engine.
    pub async fn put(&self, result: CanonicalResult, ttl: Duration) {
        if !result.status.is_servable() {
            warn!(
                subject = %result.subject,
                task = %result.task,
                status = result.status.as_str(),
                "Refusing to cache non-servable result"
            );
            return;
        }

        let key = CacheKey::new(&result.subject, result.task, &result.parameter);
        let entry = CacheEntry {
            result,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key, entry);
    }

    /// Explicit eviction, e.g. for a force-regenerate request
    ///
    /// Reports whether an entry was actually present.
    pub async fn invalidate(&self, subject: &SubjectId, task: TaskKind, parameter: &str) -> bool {
        let key = CacheKey::new(subject, task, parameter);
        let evicted = self.entries.write().await.remove(&key).is_some();
        if evicted {
            debug!(subject = %subject, task = %task, parameter, "Invalidated cache entry");
        }
        evicted
    }

    /// Entry count including not-yet-evicted expired entries
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NormalizedPayload, ResultStatus, ScoreReport};
    use serde_json::json;

    fn completed_result(subject: &str, task: TaskKind, parameter: &str) -> CanonicalResult {
        CanonicalResult::completed(
            SubjectId::new(subject),
            task,
            parameter.to_string(),
            json!({"score": 75}),
            NormalizedPayload::Score(ScoreReport {
                score: 75.0,
                summary: "solid".to_string(),
                strengths: vec![],
                growth_areas: vec![],
            }),
            Some(Duration::from_secs(3600)),
        )
    }

    #[tokio::test]
    async fn test_put_then_get_within_ttl() {
        let cache = ResultCache::new();
        let result = completed_result("s1", TaskKind::ScoreAnalysis, "");

        cache.put(result.clone(), Duration::from_secs(60)).await;
        let hit = cache
            .get(&SubjectId::new("s1"), TaskKind::ScoreAnalysis, "")
            .await
            .unwrap();

        assert_eq!(hit.id, result.id);
        assert_eq!(hit.payload, result.payload);
    }

    #[tokio::test]
    async fn test_get_after_ttl_returns_none_and_evicts() {
        let cache = ResultCache::new();
        cache
            .put(
                completed_result("s1", TaskKind::ScoreAnalysis, ""),
                Duration::from_millis(10),
            )
            .await;

        tokio::time::sleep(Duration::from_millis(30)).await;

        let miss = cache
            .get(&SubjectId::new("s1"), TaskKind::ScoreAnalysis, "")
            .await;
        assert!(miss.is_none());
        assert_eq!(cache.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_results_are_refused() {
        let cache = ResultCache::new();
        let mut result = completed_result("s1", TaskKind::ScoreAnalysis, "");
        result.status = ResultStatus::Failed;

        cache.put(result, Duration::from_secs(60)).await;

        assert_eq!(cache.entry_count().await, 0);
        assert!(cache
            .get(&SubjectId::new("s1"), TaskKind::ScoreAnalysis, "")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_invalidate_removes_entry() {
        let cache = ResultCache::new();
        cache
            .put(
                completed_result("s1", TaskKind::ScoreAnalysis, ""),
                Duration::from_secs(60),
            )
            .await;

        cache
            .invalidate(&SubjectId::new("s1"), TaskKind::ScoreAnalysis, "")
            .await;

        assert!(cache
            .get(&SubjectId::new("s1"), TaskKind::ScoreAnalysis, "")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_distinct_parameters_are_independent() {
        let cache = ResultCache::new();
        cache
            .put(
                completed_result("s1", TaskKind::LearningPath, "Engineer"),
                Duration::from_secs(60),
            )
            .await;
        cache
            .put(
                completed_result("s1", TaskKind::LearningPath, "Nurse"),
                Duration::from_secs(60),
            )
            .await;

        cache
            .invalidate(&SubjectId::new("s1"), TaskKind::LearningPath, "Engineer")
            .await;

        assert!(cache
            .get(&SubjectId::new("s1"), TaskKind::LearningPath, "Engineer")
            .await
            .is_none());
        assert!(cache
            .get(&SubjectId::new("s1"), TaskKind::LearningPath, "Nurse")
            .await
            .is_some());
    }
}
