//! TOML quiz and answer file parser.
//!
//! Loads quizzes from TOML files and directories, validates them, reads
//! learner answer files, and writes drafted quizzes back out as TOML.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::SubmitError;
use crate::model::{
    Answer, ChoiceOption, CodeLanguage, GeneratedQuestion, GenerationParams, MatchPair,
    Question, QuestionKind, Quiz, Submission, DEFAULT_POINTS, MAX_POINTS,
};

/// Intermediate TOML structure for parsing quiz files.
#[derive(Debug, Deserialize, Serialize)]
struct TomlQuizFile {
    quiz: TomlQuizHeader,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize, Serialize)]
struct TomlQuizHeader {
    id: String,
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    generation: Option<TomlGeneration>,
}

#[derive(Debug, Deserialize, Serialize)]
struct TomlGeneration {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    grade_level: Option<String>,
    #[serde(default)]
    count: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize)]
struct TomlQuestion {
    id: String,
    text: String,
    #[serde(rename = "type", default = "default_type")]
    kind: String,
    #[serde(default = "default_points")]
    points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correct: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reference_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    options: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pairs: Vec<TomlPair>,
}

#[derive(Debug, Deserialize, Serialize)]
struct TomlPair {
    left: String,
    right: String,
}

fn default_type() -> String {
    "multiple_choice".to_string()
}

fn default_points() -> u32 {
    DEFAULT_POINTS
}

#[derive(Debug, Deserialize)]
struct TomlAnswersFile {
    #[serde(default)]
    answers: HashMap<String, Answer>,
}

/// Parse a single TOML file into a `Quiz`.
pub fn parse_quiz(path: &Path) -> Result<Quiz> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read quiz file: {}", path.display()))?;

    parse_quiz_str(&content, path)
}

/// Parse a TOML string into a `Quiz` (useful for testing).
pub fn parse_quiz_str(content: &str, source_path: &Path) -> Result<Quiz> {
    let parsed: TomlQuizFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let questions = parsed
        .questions
        .into_iter()
        .map(convert_question)
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("invalid quiz: {}", source_path.display()))?;

    let generation = parsed.quiz.generation.map(|g| {
        let defaults = GenerationParams::default();
        GenerationParams {
            topic: g.topic.unwrap_or(defaults.topic),
            grade_level: g.grade_level.unwrap_or(defaults.grade_level),
            count: g.count.unwrap_or(defaults.count),
        }
    });

    Ok(Quiz {
        id: parsed.quiz.id,
        title: parsed.quiz.title,
        subject_id: parsed.quiz.subject,
        questions,
        generation,
    })
}

fn convert_question(q: TomlQuestion) -> Result<Question> {
    if q.points == 0 {
        anyhow::bail!("question '{}': points must be positive", q.id);
    }
    if q.points > MAX_POINTS {
        anyhow::bail!(
            "question '{}': points must not exceed {} (got {})",
            q.id,
            MAX_POINTS,
            q.points
        );
    }

    let kind = match q.kind.as_str() {
        "multiple_choice" | "multi" => {
            let correct = q
                .correct
                .with_context(|| format!("question '{}': missing correct label", q.id))?;
            if q.options.is_empty() {
                anyhow::bail!("question '{}': multiple-choice question has no options", q.id);
            }
            if !q.options.contains_key(&correct) {
                anyhow::bail!(
                    "question '{}': correct label '{}' is not one of the options",
                    q.id,
                    correct
                );
            }
            QuestionKind::MultipleChoice {
                options: q
                    .options
                    .into_iter()
                    .map(|(label, text)| ChoiceOption { label, text })
                    .collect(),
                correct,
            }
        }
        "matching" => QuestionKind::Matching {
            pairs: q
                .pairs
                .into_iter()
                .map(|p| MatchPair {
                    left: p.left,
                    right: p.right,
                })
                .collect(),
        },
        "text" => QuestionKind::Text {
            reference_answer: q.reference_answer,
        },
        "math" => QuestionKind::Math {
            reference_answer: q.reference_answer,
        },
        "code" => {
            let language = q
                .language
                .map(|l| l.parse::<CodeLanguage>().map_err(|e| anyhow::anyhow!("{}", e)))
                .transpose()
                .with_context(|| format!("question '{}'", q.id))?;
            QuestionKind::Code {
                language,
                reference_answer: q.reference_answer,
            }
        }
        other => anyhow::bail!("question '{}': unknown question type '{}'", q.id, other),
    };

    Ok(Question {
        id: q.id,
        text: q.text,
        points: q.points,
        kind,
    })
}

fn toml_question(q: &Question) -> TomlQuestion {
    let mut out = TomlQuestion {
        id: q.id.clone(),
        text: q.text.clone(),
        kind: q.kind.name().to_string(),
        points: q.points,
        correct: None,
        reference_answer: q.kind.reference_answer().map(str::to_string),
        language: None,
        options: BTreeMap::new(),
        pairs: Vec::new(),
    };
    match &q.kind {
        QuestionKind::MultipleChoice { options, correct } => {
            out.correct = Some(correct.clone());
            out.options = options
                .iter()
                .map(|o| (o.label.clone(), o.text.clone()))
                .collect();
        }
        QuestionKind::Matching { pairs } => {
            out.pairs = pairs
                .iter()
                .map(|p| TomlPair {
                    left: p.left.clone(),
                    right: p.right.clone(),
                })
                .collect();
        }
        QuestionKind::Code { language, .. } => {
            out.language = language.map(|l| l.to_string());
        }
        QuestionKind::Text { .. } | QuestionKind::Math { .. } => {}
    }
    out
}

/// Render a quiz in the quiz file format.
pub fn quiz_to_toml(quiz: &Quiz) -> Result<String> {
    let file = TomlQuizFile {
        quiz: TomlQuizHeader {
            id: quiz.id.clone(),
            title: quiz.title.clone(),
            subject: quiz.subject_id.clone(),
            generation: quiz.generation.as_ref().map(|g| TomlGeneration {
                topic: Some(g.topic.clone()),
                grade_level: Some(g.grade_level.clone()),
                count: Some(g.count),
            }),
        },
        questions: quiz.questions.iter().map(toml_question).collect(),
    };
    toml::to_string(&file).with_context(|| format!("failed to serialize quiz '{}'", quiz.id))
}

/// Build a static multiple-choice quiz from generated questions.
///
/// Questions are numbered `q1`, `q2`, ... and worth `DEFAULT_POINTS` each.
/// A question whose correct label is not among its options is dropped.
pub fn draft_quiz(
    id: &str,
    title: &str,
    subject: Option<&str>,
    generated: Vec<GeneratedQuestion>,
) -> Quiz {
    let questions = generated
        .into_iter()
        .filter(|g| {
            let known = g.has_valid_answer();
            if !known {
                tracing::warn!(
                    "dropping drafted question '{}': answer '{}' is not an option",
                    g.question,
                    g.correct_answer
                );
            }
            known
        })
        .enumerate()
        .map(|(i, g)| Question {
            id: format!("q{}", i + 1),
            text: g.question,
            points: DEFAULT_POINTS,
            kind: QuestionKind::MultipleChoice {
                options: g.options,
                correct: g.correct_answer,
            },
        })
        .collect();

    Quiz {
        id: id.to_string(),
        title: title.to_string(),
        subject_id: subject.map(str::to_string),
        questions,
        generation: None,
    }
}

/// Recursively load all `.toml` quiz files from a directory.
pub fn load_quiz_directory(dir: &Path) -> Result<Vec<Quiz>> {
    let mut quizzes = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            quizzes.extend(load_quiz_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_quiz(&path) {
                Ok(quiz) => quizzes.push(quiz),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(quizzes)
}

/// Read a learner's answers from a TOML file with an `[answers]` table.
pub fn parse_answers(path: &Path) -> Result<Submission> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answers file: {}", path.display()))?;
    parse_answers_str(&content, path)
}

pub fn parse_answers_str(content: &str, source_path: &Path) -> Result<Submission> {
    let parsed: TomlAnswersFile = toml::from_str(content)
        .with_context(|| format!("failed to parse answers: {}", source_path.display()))?;
    Ok(Submission {
        answers: parsed.answers,
    })
}

/// A warning from quiz validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Multiple-choice questions are written with options A through D.
const MC_OPTION_COUNT: usize = 4;

/// Validate a quiz for issues that do not stop it from being graded.
pub fn validate_quiz(quiz: &Quiz) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_ids = std::collections::HashSet::new();
    for question in &quiz.questions {
        if !seen_ids.insert(&question.id) {
            warnings.push(ValidationWarning {
                question_id: Some(question.id.clone()),
                message: format!("duplicate question ID: {}", question.id),
            });
        }
    }

    for question in &quiz.questions {
        if question.text.trim().is_empty() {
            warnings.push(ValidationWarning {
                question_id: Some(question.id.clone()),
                message: "question text is empty".into(),
            });
        }

        match &question.kind {
            QuestionKind::MultipleChoice { options, .. } if options.len() != MC_OPTION_COUNT => {
                warnings.push(ValidationWarning {
                    question_id: Some(question.id.clone()),
                    message: format!(
                        "expected {} options (A-D), found {}",
                        MC_OPTION_COUNT,
                        options.len()
                    ),
                });
            }
            QuestionKind::Matching { pairs } if pairs.is_empty() => {
                warnings.push(ValidationWarning {
                    question_id: Some(question.id.clone()),
                    message: "matching question has no pairs and can never award points".into(),
                });
            }
            _ => {}
        }
    }

    match &quiz.generation {
        Some(params) => {
            if params.count == 0 {
                warnings.push(ValidationWarning {
                    question_id: None,
                    message: "generated quiz asks for 0 questions".into(),
                });
            }
            if !quiz.questions.is_empty() {
                warnings.push(ValidationWarning {
                    question_id: None,
                    message: "generated quiz lists static questions; they will be ignored".into(),
                });
            }
        }
        None if quiz.questions.is_empty() => {
            warnings.push(ValidationWarning {
                question_id: None,
                message: "quiz has no questions".into(),
            });
        }
        None => {}
    }

    warnings
}

/// Quizzes indexed by id.
#[derive(Debug, Default)]
pub struct QuizCatalog {
    quizzes: BTreeMap<String, Quiz>,
}

impl QuizCatalog {
    pub fn new(quizzes: impl IntoIterator<Item = Quiz>) -> Self {
        Self {
            quizzes: quizzes.into_iter().map(|q| (q.id.clone(), q)).collect(),
        }
    }

    /// Load every quiz under a directory.
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self::new(load_quiz_directory(dir)?))
    }

    pub fn get(&self, id: &str) -> Result<&Quiz, SubmitError> {
        self.quizzes
            .get(id)
            .ok_or_else(|| SubmitError::QuizNotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.quizzes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quizzes.is_empty()
    }
}
