//! Core data model types for quizmark.
//!
//! Quizzes, questions and learner submissions. Question kinds form a closed
//! enum so every scoring site has to handle every kind.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Points a question is worth when the quiz file does not say.
pub const DEFAULT_POINTS: u32 = 10;

/// Upper bound on the points a single question may be worth.
pub const MAX_POINTS: u32 = 1000;

/// A single question of a persisted quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier within the quiz; also the answer key.
    pub id: String,
    /// Prompt shown to the learner.
    pub text: String,
    /// Weight of this question. Always positive.
    pub points: u32,
    /// Type-specific payload.
    pub kind: QuestionKind,
}

/// The closed set of question kinds, each carrying what its scoring rule needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    /// Pick one labeled option.
    MultipleChoice {
        options: Vec<ChoiceOption>,
        /// Label of the correct option (e.g. "B").
        correct: String,
    },
    /// Match each left item to its right value, in stored order.
    Matching { pairs: Vec<MatchPair> },
    /// Free prose, graded externally.
    Text {
        #[serde(default)]
        reference_answer: Option<String>,
    },
    /// Free-form math answer, graded externally.
    Math {
        #[serde(default)]
        reference_answer: Option<String>,
    },
    /// Source code answer: syntax pre-check, then external grading.
    Code {
        #[serde(default)]
        language: Option<CodeLanguage>,
        #[serde(default)]
        reference_answer: Option<String>,
    },
}

impl QuestionKind {
    /// Short machine name, matching the quiz file `type` field.
    pub fn name(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice { .. } => "multiple_choice",
            QuestionKind::Matching { .. } => "matching",
            QuestionKind::Text { .. } => "text",
            QuestionKind::Math { .. } => "math",
            QuestionKind::Code { .. } => "code",
        }
    }

    /// Whether answers to this kind are graded by the external grader.
    pub fn is_free_text(&self) -> bool {
        matches!(
            self,
            QuestionKind::Text { .. } | QuestionKind::Math { .. } | QuestionKind::Code { .. }
        )
    }

    /// The reference answer of a free-text question.
    pub fn reference_answer(&self) -> Option<&str> {
        match self {
            QuestionKind::Text { reference_answer }
            | QuestionKind::Math { reference_answer }
            | QuestionKind::Code {
                reference_answer, ..
            } => reference_answer.as_deref(),
            QuestionKind::MultipleChoice { .. } | QuestionKind::Matching { .. } => None,
        }
    }
}

/// A labeled multiple-choice option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub label: String,
    pub text: String,
}

/// One left→right pair of a matching question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPair {
    pub left: String,
    pub right: String,
}

/// Languages a code question can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeLanguage {
    Python,
    JavaScript,
    TypeScript,
    Rust,
    Go,
    Cpp,
    Java,
}

impl fmt::Display for CodeLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeLanguage::Python => write!(f, "python"),
            CodeLanguage::JavaScript => write!(f, "javascript"),
            CodeLanguage::TypeScript => write!(f, "typescript"),
            CodeLanguage::Rust => write!(f, "rust"),
            CodeLanguage::Go => write!(f, "go"),
            CodeLanguage::Cpp => write!(f, "cpp"),
            CodeLanguage::Java => write!(f, "java"),
        }
    }
}

impl FromStr for CodeLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" | "py" => Ok(CodeLanguage::Python),
            "javascript" | "js" => Ok(CodeLanguage::JavaScript),
            "typescript" | "ts" => Ok(CodeLanguage::TypeScript),
            "rust" | "rs" => Ok(CodeLanguage::Rust),
            "go" | "golang" => Ok(CodeLanguage::Go),
            "cpp" | "c++" => Ok(CodeLanguage::Cpp),
            "java" => Ok(CodeLanguage::Java),
            other => Err(format!("unknown code language: {other}")),
        }
    }
}

/// Parameters for a quiz whose questions are generated per learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub topic: String,
    pub grade_level: String,
    pub count: usize,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            topic: "General".to_string(),
            grade_level: "5".to_string(),
            count: 10,
        }
    }
}

/// An ordered collection of questions, optionally tied to a subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subject_id: Option<String>,
    /// Insertion order is significant.
    #[serde(default)]
    pub questions: Vec<Question>,
    /// Present for dynamically generated (per-learner) quizzes.
    #[serde(default)]
    pub generation: Option<GenerationParams>,
}

impl Quiz {
    /// Whether questions are generated per learner at quiz start.
    pub fn is_dynamic(&self) -> bool {
        self.generation.is_some()
    }

    /// Sum of question points, or `DEFAULT_POINTS` per question when that
    /// sum is zero.
    ///
    /// Saturates at `u32::MAX` rather than overflowing.
    pub fn total_possible(&self) -> u32 {
        let sum: u64 = self.questions.iter().map(|q| u64::from(q.points)).sum();
        let total = if sum == 0 {
            self.questions.len() as u64 * u64::from(DEFAULT_POINTS)
        } else {
            sum
        };
        u32::try_from(total).unwrap_or(u32::MAX)
    }
}

/// A learner's raw answer to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    /// A single value: an option label or free text.
    Text(String),
    /// Values by position (1-indexed in the quiz, 0-indexed here), for matching.
    Positional(Vec<String>),
}

impl Answer {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Answer::Text(s) => Some(s),
            Answer::Positional(_) => None,
        }
    }

    /// The value the learner gave for a 1-indexed matching position.
    pub fn at_position(&self, position: usize) -> Option<&str> {
        match self {
            Answer::Positional(values) if position >= 1 => {
                values.get(position - 1).map(String::as_str)
            }
            _ => None,
        }
    }
}

/// A learner's answers keyed by question id (or positional index for
/// generated quizzes).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub answers: HashMap<String, Answer>,
}

impl Submission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a single-valued answer.
    pub fn with_text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.answers.insert(key.into(), Answer::Text(value.into()));
        self
    }

    /// Builder-style insert of a positional (matching) answer.
    pub fn with_positions<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.answers.insert(
            key.into(),
            Answer::Positional(values.into_iter().map(Into::into).collect()),
        );
        self
    }

    pub fn answer(&self, key: &str) -> Option<&Answer> {
        self.answers.get(key)
    }

    /// Single-valued answer for a question id.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.answer(key).and_then(Answer::as_text)
    }

    /// Single-valued answer for the 0-based position of a generated question.
    pub fn text_at(&self, index: usize) -> Option<&str> {
        self.text(&index.to_string())
    }
}

/// A multiple-choice question produced for one learner by a generator.
/// These are never persisted as quiz questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
    pub options: Vec<ChoiceOption>,
    pub correct_answer: String,
}

impl GeneratedQuestion {
    /// Whether the correct label names one of the offered options.
    pub fn has_valid_answer(&self) -> bool {
        self.options.iter().any(|o| o.label == self.correct_answer)
    }
}
