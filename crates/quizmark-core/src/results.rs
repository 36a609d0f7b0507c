//! Result types produced by grading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ChoiceOption;
use crate::scoring::percentage;

/// One recorded quiz attempt. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: Uuid,
    pub learner_id: String,
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub quiz_id: Option<String>,
    /// Percentage of total points earned, rounded down. 0..=100.
    pub score: u32,
    pub total_questions: u32,
    /// Raw points earned (for generated quizzes each question is worth one).
    pub earned_points: u32,
    /// Questions answered for full credit.
    pub correct_count: u32,
    /// Exact questions shown, kept only for generated quizzes.
    #[serde(default)]
    pub snapshot: Option<Snapshot>,
    pub completed_at: DateTime<Utc>,
}

/// How a question's points were decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum GradingMethod {
    /// Label compared against the stored correct label.
    ExactMatch,
    /// Positional pairs compared against the stored pairs.
    Matching { matched: u32, total: u32 },
    /// Code failed the local syntax check; flat partial credit.
    SyntaxRejected {
        #[serde(default)]
        message: Option<String>,
    },
    /// Scored by the external grader.
    External { percentage: u32 },
    /// The external grader failed; counted as zero.
    Degraded { reason: String },
    /// Blank free-text answer; nothing was called.
    Unanswered,
}

/// Per-question breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: String,
    pub earned: u32,
    pub possible: u32,
    pub method: GradingMethod,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl QuestionOutcome {
    pub fn is_full_credit(&self) -> bool {
        self.possible > 0 && self.earned >= self.possible
    }
}

/// Aggregated grading of one submission, before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSheet {
    pub outcomes: Vec<QuestionOutcome>,
    pub total_earned: u32,
    pub total_possible: u32,
    pub final_score: u32,
    pub correct_count: u32,
    /// Only for generated quizzes.
    #[serde(default)]
    pub snapshot: Option<Snapshot>,
}

/// One question of a generated quiz as it was shown and answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub question: String,
    pub options: Vec<ChoiceOption>,
    pub correct_answer: String,
    #[serde(default)]
    pub learner_answer: Option<String>,
    pub is_correct: bool,
}

/// The full record of a generated quiz attempt, for later review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Re-score the snapshot from its stored answers.
    ///
    /// Returns `(correct_count, final_score)`, which must equal what was
    /// computed when the attempt was graded.
    pub fn replay(&self) -> (u32, u32) {
        let correct = self
            .entries
            .iter()
            .filter(|e| e.learner_answer.as_deref() == Some(e.correct_answer.as_str()))
            .count() as u32;
        (correct, percentage(correct, self.entries.len() as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(correct: &str, given: Option<&str>) -> SnapshotEntry {
        SnapshotEntry {
            question: "q".into(),
            options: vec![],
            correct_answer: correct.into(),
            learner_answer: given.map(String::from),
            is_correct: given == Some(correct),
        }
    }

    #[test]
    fn replay_counts_exact_matches() {
        let snapshot = Snapshot {
            entries: vec![
                entry("A", Some("A")),
                entry("B", Some("C")),
                entry("C", None),
            ],
        };
        assert_eq!(snapshot.replay(), (1, 33));
    }

    #[test]
    fn replay_of_empty_snapshot_is_zero() {
        assert_eq!(Snapshot::default().replay(), (0, 0));
    }

    #[test]
    fn full_credit() {
        let outcome = QuestionOutcome {
            question_id: "q".into(),
            earned: 10,
            possible: 10,
            method: GradingMethod::ExactMatch,
            feedback: None,
        };
        assert!(outcome.is_full_credit());
    }

    #[test]
    fn snapshot_serializes_as_plain_array() {
        let snapshot = Snapshot {
            entries: vec![entry("A", Some("A"))],
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.starts_with('['));
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
