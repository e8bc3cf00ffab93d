//! Configuration resolution for mentora-relay
//!
//! Three tiers, highest priority first: CLI flags, environment variables,
//! TOML file at `<config-dir>/mentora/relay.toml`. The CLI/env tier is
//! folded in by `main`; this module owns the file tier and the defaults.
//!
//! Engine endpoints resolve per task: an explicit per-task URL wins,
//! otherwise the task's webhook path is appended to the engine base URL.
//! The resolved struct is handed to the orchestrator at construction time;
//! nothing reads configuration from ambient state at call time.

use mentora_common::{config as common_config, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::services::failover::EndpointPair;
use crate::types::TaskKind;

pub const DEFAULT_PORT: u16 = 5810;

/// Service configuration as carried by relay.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// HTTP listen port
    pub port: u16,
    /// SQLite database path; defaults to relay.db in the platform data dir
    pub database: Option<PathBuf>,
    pub engine: EngineConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database: None,
            engine: EngineConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Load the file tier, falling back to defaults when no file exists
    ///
    /// `override_path` comes from `--config` / `MENTORA_CONFIG` and replaces
    /// the conventional location when given.
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let path = match override_path {
            Some(path) => path.to_path_buf(),
            None => common_config::config_file_path("relay"),
        };

        match common_config::load_toml::<RelayConfig>(&path)? {
            Some(config) => {
                info!("Configuration loaded from {}", path.display());
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Database path: explicit setting, else the platform data dir
    pub fn database_path(&self) -> PathBuf {
        match &self.database {
            Some(path) => path.clone(),
            None => common_config::default_data_dir().join("relay.db"),
        }
    }
}

/// Automation engine endpoints and per-task policy overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Primary engine base URL; task webhook paths are appended
    pub base_url: String,
    /// Standby engine base URL used for second attempts
    ///
    /// When unset, second attempts retry the primary engine.
    pub fallback_base_url: String,
    /// Per-task overrides keyed by wire task name
    pub tasks: HashMap<TaskKind, TaskOverrides>,
}

/// Optional per-task settings; unset fields fall back to the built-in policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskOverrides {
    pub primary_url: Option<String>,
    pub fallback_url: Option<String>,
    pub timeout_secs: Option<u64>,
    /// 0 disables caching for the task outright
    pub cache_ttl_secs: Option<u64>,
    pub cache_fallbacks: Option<bool>,
}

impl EngineConfig {
    /// Endpoint pair for one task
    pub fn endpoints_for(&self, task: TaskKind) -> EndpointPair {
        let overrides = self.tasks.get(&task);

        let fallback_base = if self.fallback_base_url.trim().is_empty() {
            &self.base_url
        } else {
            &self.fallback_base_url
        };

        let primary = overrides
            .and_then(|o| o.primary_url.clone())
            .unwrap_or_else(|| join_webhook_url(&self.base_url, task));
        let fallback = overrides
            .and_then(|o| o.fallback_url.clone())
            .unwrap_or_else(|| join_webhook_url(fallback_base, task));

        EndpointPair::new(primary, fallback)
    }

    /// Per-attempt deadline for one task
    pub fn timeout_for(&self, task: TaskKind) -> Duration {
        self.tasks
            .get(&task)
            .and_then(|o| o.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or_else(|| task.webhook_timeout())
    }

    /// Cache TTL for one task; `None` disables caching
    pub fn cache_ttl_for(&self, task: TaskKind) -> Option<Duration> {
        match self.tasks.get(&task).and_then(|o| o.cache_ttl_secs) {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => task.cache_ttl(),
        }
    }

    /// Whether fallback results may be cached for one task
    pub fn cache_fallbacks_for(&self, task: TaskKind) -> bool {
        self.tasks
            .get(&task)
            .and_then(|o| o.cache_fallbacks)
            .unwrap_or_else(|| task.cache_fallbacks())
    }
}

fn join_webhook_url(base: &str, task: TaskKind) -> String {
    format!("{}{}", base.trim_end_matches('/'), task.webhook_path())
}
