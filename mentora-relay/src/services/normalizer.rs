//! Response normalization for automation engine payloads
//!
//! The engine returns JSON whose shape depends on which workflow produced it
//! and on how that workflow was last edited. The payload may arrive as a bare
//! object, as a single-element array wrapping the object, or nested under a
//! generic envelope field. Extraction walks a fixed precedence of shape
//! matchers and parses the first view that yields a usable payload for the
//! task at hand.
//!
//! **Extraction precedence:**
//! 1. Single-element array unwrapping
//! 2. Envelope fields in priority order: `output`, `data`, `json`
//! 3. The value as-is
//!
//! Unwrapping recurses to a bounded depth because the shapes compose in the
//! wild, e.g. `[{"output": [...]}]`.
//!
//! When no view parses, normalization returns a deterministic per-task
//! fallback payload instead of an error. Callers can tell the two apart via
//! the `fallback` flag, but end users always receive something renderable.

use serde_json::Value;

use crate::models::{
    CareerOption, ChatReply, LearningPlan, NormalizedPayload, ScoreReport, Transcript,
};
use crate::types::TaskKind;

/// Envelope field names the engine is known to wrap payloads under
const ENVELOPE_FIELDS: [&str; 3] = ["output", "data", "json"];

/// Field names carrying free text, in selection priority order
const TEXT_FIELDS: [&str; 7] = [
    "output", "result", "response", "message", "text", "content", "answer",
];

/// Layers of composed wrapping to peel before giving up
const MAX_UNWRAP_DEPTH: usize = 3;

/// Outcome of normalizing one upstream response
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub payload: NormalizedPayload,
    /// True when the payload is a deterministic default, not engine output
    pub fallback: bool,
}

/// One strategy for exposing the payload inside a wrapper shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeMatcher {
    /// `[{...}]` single-element array wrapping the payload
    ArrayWrapped,
    /// `{"<name>": ...}` payload nested under an envelope field
    FieldEnvelope(&'static str),
}

impl ShapeMatcher {
    fn unwrap<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        match self {
            ShapeMatcher::ArrayWrapped => match value.as_array() {
                Some(items) if items.len() == 1 => Some(&items[0]),
                _ => None,
            },
            ShapeMatcher::FieldEnvelope(name) => value.as_object()?.get(*name),
        }
    }
}

/// Normalize `raw` into the payload shape for `task`
///
/// Never fails: when no candidate view of `raw` parses, the task's
/// deterministic fallback payload is returned with `fallback = true`.
pub fn normalize(task: TaskKind, raw: &Value) -> Normalized {
    for view in candidate_views(raw) {
        if let Some(payload) = parse_view(task, view) {
            return Normalized {
                payload,
                fallback: false,
            };
        }
    }

    Normalized {
        payload: fallback_payload(task),
        fallback: true,
    }
}

/// Deterministic substitute payload for `task`
///
/// Served when the engine is unreachable or its response has no usable
/// shape. The platform shows these instead of an error page, so the wording
/// stays user-facing and upbeat.
pub fn fallback_payload(task: TaskKind) -> NormalizedPayload {
    match task {
        TaskKind::ScoreAnalysis => NormalizedPayload::Score(ScoreReport {
            score: 0.0,
            summary: "Assessment completed successfully!".to_string(),
            strengths: vec![],
            growth_areas: vec![],
        }),
        TaskKind::CareerOptions => NormalizedPayload::Careers(default_career_options()),
        TaskKind::LearningPath => NormalizedPayload::Path(LearningPlan {
            career: String::new(),
            plan: "Your personalized learning path is being prepared. Please check back shortly."
                .to_string(),
        }),
        TaskKind::ContentTranscript => NormalizedPayload::Transcript(Transcript {
            title: None,
            body: "This lesson is being generated. Please check back shortly.".to_string(),
        }),
        TaskKind::ChatAnswer => NormalizedPayload::Chat(ChatReply {
            answer: "I could not reach the mentor service just now. Please ask again in a moment."
                .to_string(),
        }),
    }
}

fn default_career_options() -> Vec<CareerOption> {
    [
        (
            "1",
            "Software Developer",
            "Build and maintain software applications.",
        ),
        (
            "2",
            "Data Analyst",
            "Turn raw data into insight that guides decisions.",
        ),
        (
            "3",
            "Digital Marketer",
            "Grow products and brands through online channels.",
        ),
    ]
    .into_iter()
    .map(|(id, career, description)| CareerOption {
        id: id.to_string(),
        career: career.to_string(),
        description: description.to_string(),
    })
    .collect()
}

/// Views of `raw` in extraction precedence order, innermost first
fn candidate_views(raw: &Value) -> Vec<&Value> {
    let mut views = Vec::new();
    collect_views(raw, 0, &mut views);
    views
}

fn collect_views<'a>(value: &'a Value, depth: usize, views: &mut Vec<&'a Value>) {
    if depth < MAX_UNWRAP_DEPTH {
        if let Some(inner) = ShapeMatcher::ArrayWrapped.unwrap(value) {
            collect_views(inner, depth + 1, views);
        }
        for name in ENVELOPE_FIELDS {
            if let Some(inner) = ShapeMatcher::FieldEnvelope(name).unwrap(value) {
                collect_views(inner, depth + 1, views);
            }
        }
    }
    views.push(value);
}

/// Try to read `view` as the payload shape for `task`
fn parse_view(task: TaskKind, view: &Value) -> Option<NormalizedPayload> {
    match task {
        TaskKind::ScoreAnalysis => parse_score(view).map(NormalizedPayload::Score),
        TaskKind::CareerOptions => parse_careers(view).map(NormalizedPayload::Careers),
        TaskKind::LearningPath => parse_plan(view).map(NormalizedPayload::Path),
        TaskKind::ContentTranscript => parse_transcript(view).map(NormalizedPayload::Transcript),
        TaskKind::ChatAnswer => {
            free_text(view).map(|answer| NormalizedPayload::Chat(ChatReply { answer }))
        }
    }
}

fn parse_score(view: &Value) -> Option<ScoreReport> {
    let object = view.as_object()?;
    // Presence of a score key is the discriminator; everything else
    // degrades field by field.
    let raw_score = object.get("score")?;

    Some(ScoreReport {
        score: coerce_percentage(raw_score),
        summary: text_at(object, "summary")
            .or_else(|| free_text(view))
            .unwrap_or_default(),
        strengths: string_list(object, &["strengths"]),
        growth_areas: string_list(object, &["growth_areas", "growthAreas", "weaknesses"]),
    })
}

fn parse_careers(view: &Value) -> Option<Vec<CareerOption>> {
    // A lone option object counts; the platform renders a list either way.
    if view.is_object() {
        return serde_json::from_value::<CareerOption>(view.clone())
            .ok()
            .map(|option| vec![option]);
    }

    let options: Vec<CareerOption> = serde_json::from_value(view.clone()).ok()?;
    if options.is_empty() {
        // An empty recommendation list is not renderable; fall through so
        // the caller serves the default set instead.
        return None;
    }
    Some(options)
}

fn parse_plan(view: &Value) -> Option<LearningPlan> {
    match view {
        Value::String(text) if !text.trim().is_empty() => Some(LearningPlan {
            career: String::new(),
            plan: text.trim().to_string(),
        }),
        Value::Object(object) => {
            let plan = text_at(object, "plan").or_else(|| free_text(view))?;
            Some(LearningPlan {
                career: text_at(object, "career").unwrap_or_default(),
                plan,
            })
        }
        _ => None,
    }
}

fn parse_transcript(view: &Value) -> Option<Transcript> {
    match view {
        Value::String(text) if !text.trim().is_empty() => Some(Transcript {
            title: None,
            body: text.trim().to_string(),
        }),
        Value::Object(object) => {
            let body = text_at(object, "body")
                .or_else(|| text_at(object, "transcript"))
                .or_else(|| free_text(view))?;
            Some(Transcript {
                title: text_at(object, "title"),
                body,
            })
        }
        _ => None,
    }
}

/// First non-empty free-text field in `view`
///
/// Nested objects are flattened to dotted paths and matched on the leaf
/// name, so `{"data": {"message": "hi"}}` resolves through `message`. A bare
/// string counts as its own text.
fn free_text(view: &Value) -> Option<String> {
    if let Value::String(text) = view {
        let trimmed = text.trim();
        return (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    let mut leaves = Vec::new();
    flatten_strings(view, "", &mut leaves);

    for candidate in TEXT_FIELDS {
        let found = leaves.iter().find(|(path, text)| {
            path.rsplit('.').next() == Some(candidate) && !text.trim().is_empty()
        });
        if let Some((_, text)) = found {
            return Some(text.trim().to_string());
        }
    }
    None
}

/// Collect every string leaf of `value` keyed by its dotted path
fn flatten_strings(value: &Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_strings(child, &path, out);
            }
        }
        Value::String(text) => out.push((prefix.to_string(), text.clone())),
        _ => {}
    }
}

/// Coerce a numeric-ish value, tolerating digit strings and a trailing `%`
///
/// Unparseable input coerces to 0; the result is clamped to [0, 100].
fn coerce_percentage(value: &Value) -> f64 {
    let number = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(text) => text
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .unwrap_or(0.0),
        _ => 0.0,
    };

    if !number.is_finite() {
        return 0.0;
    }
    number.clamp(0.0, 100.0)
}

/// First non-empty string at `key`
fn text_at(object: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    let text = object.get(key)?.as_str()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// First present key holding an array; keeps its string elements
fn string_list(object: &serde_json::Map<String, Value>, keys: &[&str]) -> Vec<String> {
    for key in keys {
        if let Some(Value::Array(items)) = object.get(*key) {
            return items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::to_string)
                .collect();
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_score_from_bare_object() {
        let raw = json!({"score": 87.5, "summary": "Strong result", "strengths": ["algebra"]});
        let normalized = normalize(TaskKind::ScoreAnalysis, &raw);

        assert!(!normalized.fallback);
        match normalized.payload {
            NormalizedPayload::Score(report) => {
                assert_eq!(report.score, 87.5);
                assert_eq!(report.summary, "Strong result");
                assert_eq!(report.strengths, vec!["algebra".to_string()]);
            }
            other => panic!("expected score payload, got {:?}", other),
        }
    }

    #[test]
    fn test_score_coercion_and_clamping() {
        for (raw_score, expected) in [
            (json!("92"), 92.0),
            (json!("87%"), 87.0),
            (json!(150), 100.0),
            (json!(-5), 0.0),
            (json!("not a number"), 0.0),
        ] {
            let raw = json!({"score": raw_score, "summary": "s"});
            match normalize(TaskKind::ScoreAnalysis, &raw).payload {
                NormalizedPayload::Score(report) => assert_eq!(report.score, expected),
                other => panic!("expected score payload, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_score_summary_from_free_text_field() {
        let raw = json!({"score": 70, "output": "Keep practicing fractions"});
        match normalize(TaskKind::ScoreAnalysis, &raw).payload {
            NormalizedPayload::Score(report) => {
                assert_eq!(report.summary, "Keep practicing fractions");
            }
            other => panic!("expected score payload, got {:?}", other),
        }
    }

    #[test]
    fn test_careers_from_array_wrapped_envelope() {
        // Observed production shape: array wrapping an output envelope
        let raw = json!([{"output": [{"ID": "1", "career": "X", "description": "Y"}]}]);
        let normalized = normalize(TaskKind::CareerOptions, &raw);

        assert!(!normalized.fallback);
        match normalized.payload {
            NormalizedPayload::Careers(options) => {
                assert_eq!(options.len(), 1);
                assert_eq!(options[0].id, "1");
                assert_eq!(options[0].career, "X");
                assert_eq!(options[0].description, "Y");
            }
            other => panic!("expected careers payload, got {:?}", other),
        }
    }

    #[test]
    fn test_careers_from_plain_array() {
        let raw = json!([
            {"ID": 1, "career": "Nurse", "description": "a"},
            {"ID": 2, "career": "Pilot", "description": "b"},
            {"ID": 3, "career": "Chef", "description": "c"}
        ]);
        match normalize(TaskKind::CareerOptions, &raw).payload {
            NormalizedPayload::Careers(options) => {
                assert_eq!(options.len(), 3);
                assert_eq!(options[1].career, "Pilot");
            }
            other => panic!("expected careers payload, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_career_list_falls_back_to_defaults() {
        let raw = json!({"output": []});
        let normalized = normalize(TaskKind::CareerOptions, &raw);

        assert!(normalized.fallback);
        match normalized.payload {
            NormalizedPayload::Careers(options) => assert_eq!(options.len(), 3),
            other => panic!("expected careers payload, got {:?}", other),
        }
    }

    #[test]
    fn test_envelope_priority_output_before_data() {
        let raw = json!({
            "output": {"score": 10, "summary": "from output"},
            "data": {"score": 20, "summary": "from data"}
        });
        match normalize(TaskKind::ScoreAnalysis, &raw).payload {
            NormalizedPayload::Score(report) => assert_eq!(report.summary, "from output"),
            other => panic!("expected score payload, got {:?}", other),
        }
    }

    #[test]
    fn test_chat_answer_from_nested_free_text() {
        let raw = json!({"conversation": {"message": "Focus on calculus first."}});
        match normalize(TaskKind::ChatAnswer, &raw).payload {
            NormalizedPayload::Chat(reply) => assert_eq!(reply.answer, "Focus on calculus first."),
            other => panic!("expected chat payload, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_text_is_not_an_answer() {
        let raw = json!({"response": "   "});
        let normalized = normalize(TaskKind::ChatAnswer, &raw);
        assert!(normalized.fallback);
    }

    #[test]
    fn test_transcript_from_string_envelope() {
        let raw = json!({"output": "Photosynthesis converts light into chemical energy."});
        match normalize(TaskKind::ContentTranscript, &raw).payload {
            NormalizedPayload::Transcript(transcript) => {
                assert_eq!(transcript.title, None);
                assert!(transcript.body.starts_with("Photosynthesis"));
            }
            other => panic!("expected transcript payload, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_keeps_career_label() {
        let raw = json!({"career": "Engineer", "plan": "Week 1: fundamentals"});
        match normalize(TaskKind::LearningPath, &raw).payload {
            NormalizedPayload::Path(plan) => {
                assert_eq!(plan.career, "Engineer");
                assert_eq!(plan.plan, "Week 1: fundamentals");
            }
            other => panic!("expected path payload, got {:?}", other),
        }
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let garbage = json!({"unexpected": {"deeply": [1, 2, 3]}});

        let first = normalize(TaskKind::ScoreAnalysis, &garbage);
        let second = normalize(TaskKind::ScoreAnalysis, &garbage);

        assert!(first.fallback);
        let first_json = serde_json::to_string(&first.payload).unwrap();
        let second_json = serde_json::to_string(&second.payload).unwrap();
        assert_eq!(first_json, second_json);

        match first.payload {
            NormalizedPayload::Score(report) => {
                assert_eq!(report.score, 0.0);
                assert_eq!(report.summary, "Assessment completed successfully!");
            }
            other => panic!("expected score payload, got {:?}", other),
        }
    }
}
