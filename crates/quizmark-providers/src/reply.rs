//! Turning free-text model replies into grades and questions.

use serde::Deserialize;
use serde_json::Value;

use quizmark_core::error::ProviderError;
use quizmark_core::model::{ChoiceOption, GeneratedQuestion};
use quizmark_core::traits::{extract_json_payload, GradeResponse};

// Uzbek keys show up when the model answers in the learner's language.
const QUESTION_KEYS: &[&str] = &["question", "text", "savol"];
const OPTION_KEYS: &[&str] = &["options", "variants", "choices", "variantlar"];
const CORRECT_KEYS: &[&str] = &[
    "correct_answer",
    "answer",
    "correct",
    "javob",
    "togri_javob",
    "to'g'ri_javob",
];
const DEFAULT_LABELS: [&str; 4] = ["A", "B", "C", "D"];
const MISSING_QUESTION: &str = "Question text unavailable";

#[derive(Deserialize)]
struct GradeReply {
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    feedback: Option<String>,
}

/// Parse a `{score, feedback}` grading reply. A missing score reads as 0.
pub fn parse_grade_reply(reply: &str) -> Result<GradeResponse, ProviderError> {
    let json = extract_json_payload(reply, '{', '}')
        .ok_or_else(|| ProviderError::MalformedReply("no JSON object in reply".into()))?;
    let parsed: GradeReply =
        serde_json::from_str(&json).map_err(|e| ProviderError::MalformedReply(e.to_string()))?;

    let score = match parsed.score {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse().unwrap_or(0.0),
        _ => 0.0,
    };

    Ok(GradeResponse::clamped(
        score.round() as i64,
        parsed.feedback.unwrap_or_default(),
    ))
}

/// Parse a reply holding a JSON array of questions and normalize it.
pub fn parse_question_reply(reply: &str) -> Result<Vec<GeneratedQuestion>, ProviderError> {
    let json = extract_json_payload(reply, '[', ']')
        .ok_or_else(|| ProviderError::MalformedReply("no JSON array in reply".into()))?;
    let value: Value =
        serde_json::from_str(&json).map_err(|e| ProviderError::MalformedReply(e.to_string()))?;
    Ok(normalize_questions(&value))
}

/// Coerce loosely shaped question objects into `GeneratedQuestion`s.
///
/// Keys are matched case-insensitively against known aliases. Options may be
/// an object keyed by label or an array (labeled A, B, C...). Missing fields
/// get defaults; entries that are not objects are dropped.
pub fn normalize_questions(value: &Value) -> Vec<GeneratedQuestion> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(Value::as_object)
        .map(|entry| {
            let lookup = |aliases: &[&str]| {
                entry
                    .iter()
                    .find(|(k, _)| aliases.contains(&k.to_lowercase().as_str()))
                    .map(|(_, v)| v)
            };

            let question = lookup(QUESTION_KEYS)
                .map(value_text)
                .filter(|q| !q.trim().is_empty())
                .unwrap_or_else(|| MISSING_QUESTION.to_string());

            let options = lookup(OPTION_KEYS)
                .map(normalize_options)
                .filter(|o| !o.is_empty())
                .unwrap_or_else(default_options);

            let correct_answer = lookup(CORRECT_KEYS)
                .map(|v| value_text(v).trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "A".to_string());

            GeneratedQuestion {
                question,
                options,
                correct_answer,
            }
        })
        .collect()
}

fn normalize_options(value: &Value) -> Vec<ChoiceOption> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(label, text)| ChoiceOption {
                label: label.clone(),
                text: value_text(text),
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .zip(b'A'..=b'Z')
            .map(|(text, label)| ChoiceOption {
                label: char::from(label).to_string(),
                text: value_text(text),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn default_options() -> Vec<ChoiceOption> {
    DEFAULT_LABELS
        .iter()
        .map(|label| ChoiceOption {
            label: (*label).to_string(),
            text: "-".to_string(),
        })
        .collect()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
