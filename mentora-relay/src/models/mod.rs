//! Data models for the workflow relay

pub mod canonical_result;
pub mod payload;

pub use canonical_result::{CanonicalResult, ResultStatus};
pub use payload::{
    CareerOption, ChatReply, LearningPlan, NormalizedPayload, ScoreReport, Transcript,
};
