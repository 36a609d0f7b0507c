//! Collaborator trait definitions: graders, syntax checkers and question
//! generators.
//!
//! The grading engine only sees these traits. `quizmark-providers` implements
//! `Grader` and `QuestionGenerator` on top of LLM backends, and
//! `quizmark-runner` implements `SyntaxChecker` with local toolchains.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{CodeLanguage, GeneratedQuestion};

// ---------------------------------------------------------------------------
// Free-text grader
// ---------------------------------------------------------------------------

/// Scores a free-text answer from 0 to 100.
#[async_trait]
pub trait Grader: Send + Sync {
    /// Human-readable backend name (e.g. "openai").
    fn name(&self) -> &str;

    /// Grade one answer. Errors are absorbed by the engine as a zero score.
    async fn grade(&self, request: &GradeRequest) -> anyhow::Result<GradeResponse>;
}

/// What the grader is asked to judge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeRequest {
    /// The question prompt.
    pub question: String,
    /// The learner's answer, never empty.
    pub answer: String,
    /// Model answer used as a hint, not for exact matching.
    #[serde(default)]
    pub reference_answer: Option<String>,
}

/// The grader's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeResponse {
    /// Correctness percentage, 0..=100.
    pub score: u32,
    /// Short explanation for the learner.
    #[serde(default)]
    pub feedback: String,
}

impl GradeResponse {
    /// Build a response, clamping the score into 0..=100.
    pub fn clamped(score: i64, feedback: impl Into<String>) -> Self {
        Self {
            score: score.clamp(0, 100) as u32,
            feedback: feedback.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Syntax checker
// ---------------------------------------------------------------------------

/// Cheap local validity check for code answers.
#[async_trait]
pub trait SyntaxChecker: Send + Sync {
    /// Whether a checker for this language is available at all.
    fn supports(&self, language: CodeLanguage) -> bool;

    /// Check the code. `Err` means the check could not be performed.
    async fn check(&self, request: &SyntaxCheckRequest) -> anyhow::Result<SyntaxVerdict>;
}

/// Code to check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntaxCheckRequest {
    pub code: String,
    pub language: CodeLanguage,
}

/// Outcome of a syntax check that actually ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxVerdict {
    pub valid: bool,
    /// First diagnostic line reported by the toolchain, if any.
    #[serde(default)]
    pub message: Option<String>,
}

impl SyntaxVerdict {
    pub fn valid() -> Self {
        Self {
            valid: true,
            message: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
        }
    }
}

/// A checker that supports nothing, so code always goes to the grader.
pub struct NoSyntaxChecker;

#[async_trait]
impl SyntaxChecker for NoSyntaxChecker {
    fn supports(&self, _: CodeLanguage) -> bool {
        false
    }

    async fn check(&self, request: &SyntaxCheckRequest) -> anyhow::Result<SyntaxVerdict> {
        anyhow::bail!("no syntax checker for {}", request.language)
    }
}

// ---------------------------------------------------------------------------
// Question generator
// ---------------------------------------------------------------------------

/// Produces multiple-choice questions on demand.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<Vec<GeneratedQuestion>>;
}

/// What to generate questions from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum GenerationRequest {
    /// Fresh questions for one learner.
    Topic {
        topic: String,
        grade_level: String,
        count: usize,
    },
    /// A quiz draft from teaching material.
    Material { text: String, count: usize },
}

impl GenerationRequest {
    pub fn count(&self) -> usize {
        match self {
            GenerationRequest::Topic { count, .. } | GenerationRequest::Material { count, .. } => {
                *count
            }
        }
    }
}

// ---------------------------------------------------------------------------
// JSON payload extraction
// ---------------------------------------------------------------------------

/// Pull the JSON payload out of a free-text model reply.
///
/// Looks inside the first fenced block (a ```json block wins over a bare
/// one) when there is one, then returns the span from the first `open` to the
/// last `close` character. Returns `None` when no such span exists.
pub fn extract_json_payload(response: &str, open: char, close: char) -> Option<String> {
    let body = fenced_block(response).unwrap_or_else(|| response.to_string());
    let start = body.find(open)?;
    let end = body.rfind(close)?;
    if end < start {
        return None;
    }
    Some(body[start..=end].to_string())
}

fn fenced_block(response: &str) -> Option<String> {
    let mut json_block = None;
    let mut generic_block = None;
    let mut in_block = false;
    let mut is_json = false;
    let mut current = String::new();

    for line in response.lines() {
        let trimmed = line.trim();

        if !in_block && trimmed.starts_with("```") {
            in_block = true;
            let lang = trimmed.trim_start_matches('`').trim().to_lowercase();
            is_json = lang == "json";
            current.clear();
            continue;
        }

        if in_block && trimmed == "```" {
            in_block = false;
            if is_json && json_block.is_none() {
                json_block = Some(current.clone());
            } else if !is_json && generic_block.is_none() {
                generic_block = Some(current.clone());
            }
            continue;
        }

        if in_block {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }

    // Truncated reply: keep what the unclosed block accumulated
    if in_block && !current.is_empty() {
        if is_json && json_block.is_none() {
            json_block = Some(current);
        } else if !is_json && generic_block.is_none() {
            generic_block = Some(current);
        }
    }

    json_block.or(generic_block)
}
