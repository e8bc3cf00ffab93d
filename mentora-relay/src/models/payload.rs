//! Task-specific normalized payloads
//!
//! These are the canonical shapes the rest of the platform consumes. The
//! automation engine's output drifts (string vs numeric ids, renamed
//! fields, envelope wrappers); everything drift-tolerant lives in the
//! normalizer, while the types here stay strict on the way out.

use mentora_common::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::types::TaskKind;

/// Scored assessment with narrative feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Percentage score, clamped to [0, 100] during normalization
    pub score: f64,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strengths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub growth_areas: Vec<String>,
}

/// One recommended career option
///
/// The upstream workflow emits `ID` (capitalized); the wire shape is kept
/// as-is because platform consumers already match on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerOption {
    #[serde(rename = "ID", alias = "id", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "title")]
    pub career: String,
    #[serde(default, alias = "desc")]
    pub description: String,
}

/// Generated learning path for one chosen career
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPlan {
    pub career: String,
    /// Free-text plan body (markdown from the automation engine)
    pub plan: String,
}

/// Generated module/chapter transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
}

/// One mentor chat reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub answer: String,
}

/// Normalized payload for one computation, tagged by task kind
///
/// Serializes untagged so API responses and persisted rows carry the bare
/// object/array the task produces, with no wrapper field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NormalizedPayload {
    Score(ScoreReport),
    Careers(Vec<CareerOption>),
    Path(LearningPlan),
    Transcript(Transcript),
    Chat(ChatReply),
}

impl NormalizedPayload {
    /// Serialize for database storage
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::Internal(format!("Failed to serialize payload: {}", e)))
    }

    /// Parse a stored payload; untagged shapes need the task kind to pick
    /// the variant
    pub fn from_stored(task: TaskKind, json: &str) -> Result<Self> {
        let parse_err =
            |e: serde_json::Error| Error::Internal(format!("Failed to parse stored payload: {}", e));
        Ok(match task {
            TaskKind::ScoreAnalysis => {
                NormalizedPayload::Score(serde_json::from_str(json).map_err(parse_err)?)
            }
            TaskKind::CareerOptions => {
                NormalizedPayload::Careers(serde_json::from_str(json).map_err(parse_err)?)
            }
            TaskKind::LearningPath => {
                NormalizedPayload::Path(serde_json::from_str(json).map_err(parse_err)?)
            }
            TaskKind::ContentTranscript => {
                NormalizedPayload::Transcript(serde_json::from_str(json).map_err(parse_err)?)
            }
            TaskKind::ChatAnswer => {
                NormalizedPayload::Chat(serde_json::from_str(json).map_err(parse_err)?)
            }
        })
    }
}

/// Accept `"1"` and `1` interchangeably for id fields
///
/// The automation engine emits whichever the workflow author last saved.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}
