//! Core identifier and task-policy types for the workflow relay
//!
//! Every remote computation is keyed by (subject, task kind, parameter).
//! The per-kind policy knobs (timeout, cache TTL, persistence) live here so
//! callers construct orchestration behavior from one place instead of
//! scattering magic numbers across call sites.

use mentora_common::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Opaque identifier for the entity a computation targets (e.g. a learner)
///
/// Assigned elsewhere in the platform; the relay treats it as an opaque key
/// component and only rejects blank values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank subjects are caller bugs, not degradable failures
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// How a task's request payload travels to the automation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEncoding {
    /// GET with the payload flattened into query parameters
    QueryParams,
    /// POST with the payload as a JSON body
    JsonBody,
}

/// Remote workflow kinds the relay can invoke
///
/// Closed set: each variant corresponds to one workflow in the automation
/// engine, with its own endpoint pair, timeout, and caching policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    /// Assessment scoring and narrative feedback
    ScoreAnalysis,
    /// Career option recommendations for a scored subject
    CareerOptions,
    /// Learning path generation for one chosen career
    LearningPath,
    /// Module/chapter transcript generation
    ContentTranscript,
    /// Interactive mentor chat turn
    ChatAnswer,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::ScoreAnalysis,
        TaskKind::CareerOptions,
        TaskKind::LearningPath,
        TaskKind::ContentTranscript,
        TaskKind::ChatAnswer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::ScoreAnalysis => "score-analysis",
            TaskKind::CareerOptions => "career-options",
            TaskKind::LearningPath => "learning-path",
            TaskKind::ContentTranscript => "content-transcript",
            TaskKind::ChatAnswer => "chat-answer",
        }
    }

    /// Webhook path appended to a configured engine base URL
    pub fn webhook_path(&self) -> String {
        format!("/webhook/{}", self.as_str())
    }

    /// Per-attempt deadline for the remote engine
    ///
    /// Observed workflow latencies differ widely: option generation is
    /// lightweight, transcript generation routinely runs close to a minute.
    pub fn webhook_timeout(&self) -> Duration {
        match self {
            TaskKind::CareerOptions => Duration::from_secs(15),
            TaskKind::ScoreAnalysis | TaskKind::ChatAnswer => Duration::from_secs(30),
            TaskKind::LearningPath => Duration::from_secs(45),
            TaskKind::ContentTranscript => Duration::from_secs(60),
        }
    }

    /// How long a computed result may be served from cache
    ///
    /// Chat turns are interactive and never cached.
    pub fn cache_ttl(&self) -> Option<Duration> {
        match self {
            TaskKind::ChatAnswer => None,
            _ => Some(Duration::from_secs(24 * 60 * 60)),
        }
    }

    /// Whether fallback results may be cached
    ///
    /// Default is no for every kind: a cached fallback would suppress the
    /// retry that could replace it with a real result.
    pub fn cache_fallbacks(&self) -> bool {
        false
    }

    /// Whether completed results are persisted as canonical rows
    ///
    /// Chat answers are conversational output, not per-subject artifacts.
    pub fn persists_results(&self) -> bool {
        !matches!(self, TaskKind::ChatAnswer)
    }

    /// Business-level attempt ceiling, where the workflow has one
    ///
    /// Assessment retakes carry an attempt number; beyond the ceiling the
    /// request is a policy violation surfaced to the caller, never masked
    /// by a fallback.
    pub fn max_attempts(&self) -> Option<u32> {
        match self {
            TaskKind::ScoreAnalysis => Some(5),
            _ => None,
        }
    }

    pub fn request_encoding(&self) -> RequestEncoding {
        match self {
            TaskKind::CareerOptions | TaskKind::ContentTranscript => RequestEncoding::QueryParams,
            TaskKind::ScoreAnalysis | TaskKind::LearningPath | TaskKind::ChatAnswer => {
                RequestEncoding::JsonBody
            }
        }
    }

    /// Webhook field the task parameter travels under, for parameterized kinds
    ///
    /// Learning paths are keyed by the chosen career, transcripts by the
    /// module being generated; the engine workflows expect those names.
    pub fn parameter_field(&self) -> Option<&'static str> {
        match self {
            TaskKind::LearningPath => Some("career"),
            TaskKind::ContentTranscript => Some("module"),
            _ => None,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "score-analysis" => Ok(TaskKind::ScoreAnalysis),
            "career-options" => Ok(TaskKind::CareerOptions),
            "learning-path" => Ok(TaskKind::LearningPath),
            "content-transcript" => Ok(TaskKind::ContentTranscript),
            "chat-answer" => Ok(TaskKind::ChatAnswer),
            other => Err(Error::InvalidInput(format!("Unknown task kind: {}", other))),
        }
    }
}
