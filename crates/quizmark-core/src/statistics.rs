//! Read-side statistics over recorded results and progress.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::progress::{lifetime_total, Progress, Rank};
use crate::results::TestResult;

/// Subject percentage at which a subject counts as completed.
pub const COMPLETION_THRESHOLD: u32 = 70;

/// Highest level shown on the leaderboard.
pub const MAX_LEVEL: u32 = 10;

/// The learner's best attempt at a quiz, if any.
pub fn best_attempt<'a>(
    results: &'a [TestResult],
    learner_id: &str,
    quiz_id: &str,
) -> Option<&'a TestResult> {
    results
        .iter()
        .filter(|r| r.learner_id == learner_id && r.quiz_id.as_deref() == Some(quiz_id))
        .max_by_key(|r| r.score)
}

/// Best score per quiz across a set of results.
pub fn best_scores_by_quiz(results: &[TestResult]) -> BTreeMap<String, u32> {
    let mut best = BTreeMap::new();
    for result in results {
        if let Some(quiz_id) = &result.quiz_id {
            let entry = best.entry(quiz_id.clone()).or_insert(0);
            *entry = (*entry).max(result.score);
        }
    }
    best
}

/// Mean score, rounded half up. 0 for an empty history.
pub fn average_score(results: &[TestResult]) -> u32 {
    rounded_mean(results.iter().map(|r| r.score))
}

pub fn tests_taken(results: &[TestResult]) -> usize {
    results.len()
}

/// Mean of subject percentages, rounded half up.
pub fn overall_progress(progress: &[Progress]) -> u32 {
    rounded_mean(progress.iter().map(|p| p.percentage))
}

/// Subjects at or above the completion threshold.
pub fn completed_subjects(progress: &[Progress]) -> Vec<&Progress> {
    progress
        .iter()
        .filter(|p| p.percentage >= COMPLETION_THRESHOLD)
        .collect()
}

fn rounded_mean(values: impl Iterator<Item = u32>) -> u32 {
    let (sum, count) = values.fold((0u64, 0u64), |(s, c), v| (s + u64::from(v), c + 1));
    if count == 0 {
        return 0;
    }
    ((sum * 2 + count) / (count * 2)) as u32
}

/// Summary of one learner's standing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerSummary {
    pub learner_id: String,
    pub tests_taken: usize,
    pub average_score: u32,
    pub overall_progress: u32,
    pub completed_subjects: usize,
    pub total_score: u64,
    pub rank: Rank,
}

impl LearnerSummary {
    pub fn new(learner_id: &str, results: &[TestResult], progress: &[Progress]) -> Self {
        Self {
            learner_id: learner_id.to_string(),
            tests_taken: tests_taken(results),
            average_score: average_score(results),
            overall_progress: overall_progress(progress),
            completed_subjects: completed_subjects(progress).len(),
            total_score: lifetime_total(results),
            rank: Rank::from_results(results),
        }
    }
}

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub learner_id: String,
    pub total_score: u64,
    pub tests_taken: usize,
    pub level: u32,
    pub rank: Rank,
}

/// Level shown next to a lifetime total: one per 100 points, capped.
pub fn level_for(total: u64) -> u32 {
    (total / 100 + 1).min(u64::from(MAX_LEVEL)) as u32
}

/// Learners ordered by lifetime score sum (highest first, ties by id).
pub fn leaderboard(results: &[TestResult]) -> Vec<LeaderboardEntry> {
    let mut totals: BTreeMap<&str, (u64, usize)> = BTreeMap::new();
    for result in results {
        let entry = totals.entry(result.learner_id.as_str()).or_default();
        entry.0 += u64::from(result.score);
        entry.1 += 1;
    }

    let mut entries: Vec<_> = totals
        .into_iter()
        .map(|(learner_id, (total_score, tests_taken))| LeaderboardEntry {
            learner_id: learner_id.to_string(),
            total_score,
            tests_taken,
            level: level_for(total_score),
            rank: Rank::for_total(total_score),
        })
        .collect();

    entries.sort_by(|a, b| {
        b.total_score
            .cmp(&a.total_score)
            .then_with(|| a.learner_id.cmp(&b.learner_id))
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn result(learner: &str, quiz: &str, score: u32) -> TestResult {
        TestResult {
            id: Uuid::new_v4(),
            learner_id: learner.into(),
            subject_id: None,
            quiz_id: Some(quiz.into()),
            score,
            total_questions: 1,
            earned_points: 0,
            correct_count: 0,
            snapshot: None,
            completed_at: Utc::now(),
        }
    }

    fn progress(subject: &str, percentage: u32) -> Progress {
        let mut p = Progress::new("ann", subject, Utc::now());
        p.record(percentage, Utc::now());
        p
    }

    #[test]
    fn best_attempt_picks_max() {
        let results = vec![
            result("ann", "q1", 40),
            result("ann", "q1", 90),
            result("ann", "q1", 60),
            result("bob", "q1", 100),
        ];
        assert_eq!(best_attempt(&results, "ann", "q1").unwrap().score, 90);
        assert!(best_attempt(&results, "ann", "q2").is_none());
        assert_eq!(best_scores_by_quiz(&results)["q1"], 100);
    }

    #[test]
    fn averages_round() {
        let results = vec![result("ann", "a", 50), result("ann", "b", 51)];
        assert_eq!(average_score(&results), 51);
        assert_eq!(average_score(&[]), 0);
        assert_eq!(tests_taken(&results), 2);
    }

    #[test]
    fn completion_threshold() {
        let subjects = vec![progress("math", 70), progress("art", 69), progress("bio", 100)];
        let done: Vec<_> = completed_subjects(&subjects)
            .iter()
            .map(|p| p.subject_id.as_str())
            .collect();
        assert_eq!(done, ["math", "bio"]);
        assert_eq!(overall_progress(&subjects), 80);
    }

    #[test]
    fn leaderboard_orders_by_total_then_id() {
        let results = vec![
            result("carl", "a", 100),
            result("ann", "a", 50),
            result("ann", "b", 50),
            result("bob", "a", 100),
            result("dee", "a", 20),
        ];
        let board = leaderboard(&results);
        let order: Vec<_> = board.iter().map(|e| e.learner_id.as_str()).collect();
        assert_eq!(order, ["ann", "bob", "carl", "dee"]);
        assert_eq!(board[0].tests_taken, 2);
        assert_eq!(board[0].level, 2);
        assert_eq!(board[3].level, 1);
    }

    #[test]
    fn level_is_capped() {
        assert_eq!(level_for(0), 1);
        assert_eq!(level_for(99), 1);
        assert_eq!(level_for(100), 2);
        assert_eq!(level_for(5000), MAX_LEVEL);
    }

    #[test]
    fn summary() {
        let results = vec![result("ann", "a", 100), result("ann", "b", 60)];
        let subjects = vec![progress("math", 100), progress("art", 60)];
        let summary = LearnerSummary::new("ann", &results, &subjects);
        assert_eq!(summary.tests_taken, 2);
        assert_eq!(summary.average_score, 80);
        assert_eq!(summary.completed_subjects, 1);
        assert_eq!(summary.total_score, 160);
        assert_eq!(summary.rank, Rank::Amateur);
    }
}
