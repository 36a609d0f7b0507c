//! Per-learner question sets for dynamically generated quizzes.
//!
//! A generated quiz is issued to one learner when they start it and lives
//! here until their submission commits. Anything that is not in the cache
//! at submit time counts as an expired session.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SubmitError;
use crate::model::{ChoiceOption, GeneratedQuestion};

/// The questions one learner was shown for one dynamic quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedQuiz {
    pub quiz_id: String,
    pub learner_id: String,
    pub questions: Vec<GeneratedQuestion>,
    pub issued_at: DateTime<Utc>,
}

impl IssuedQuiz {
    pub fn new(quiz_id: &str, learner_id: &str, questions: Vec<GeneratedQuestion>) -> Self {
        Self {
            quiz_id: quiz_id.to_string(),
            learner_id: learner_id.to_string(),
            questions,
            issued_at: Utc::now(),
        }
    }
}

/// Issued quizzes keyed by learner. A learner holds at most one at a time.
#[derive(Default)]
pub struct SessionCache {
    issued: Mutex<HashMap<String, IssuedQuiz>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an issued quiz, replacing whatever the learner held before.
    pub fn issue(&self, issued: IssuedQuiz) {
        let mut map = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(issued.learner_id.clone(), issued);
    }

    /// The learner's issued set for `quiz_id`, left in place.
    pub fn peek(&self, learner_id: &str, quiz_id: &str) -> Result<IssuedQuiz, SubmitError> {
        let map = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        match map.get(learner_id) {
            Some(issued) if issued.quiz_id == quiz_id => Ok(issued.clone()),
            _ => Err(SubmitError::SessionExpired {
                quiz_id: quiz_id.to_string(),
            }),
        }
    }

    /// Forget the learner's issued set if it belongs to `quiz_id`.
    pub fn clear(&self, learner_id: &str, quiz_id: &str) {
        let mut map = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        if map.get(learner_id).is_some_and(|i| i.quiz_id == quiz_id) {
            map.remove(learner_id);
        }
    }
}

/// Stand-in questions used when generation fails, so the quiz stays
/// takeable. Every one has "A" as its correct label.
pub fn placeholder_questions(
    topic: &str,
    grade_level: &str,
    count: usize,
) -> Vec<GeneratedQuestion> {
    let options: Vec<ChoiceOption> = ["A", "B", "C", "D"]
        .iter()
        .map(|label| ChoiceOption {
            label: (*label).to_string(),
            text: format!("Sample {label}"),
        })
        .collect();

    (0..count)
        .map(|_| GeneratedQuestion {
            question: format!("Sample question on {topic} for grade {grade_level}"),
            options: options.clone(),
            correct_answer: "A".to_string(),
        })
        .collect()
}
