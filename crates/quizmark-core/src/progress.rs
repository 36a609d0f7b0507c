//! Subject progress and rank tiers.
//!
//! Both are materialized views over the result history: progress is the best
//! score per subject, rank is a threshold over the lifetime score sum.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::results::TestResult;

/// Rank tier derived from the lifetime sum of scores.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    #[default]
    NewMember,
    Amateur,
    Knowledgeable,
    Specialist,
    Expert,
}

impl Rank {
    /// Tier for a lifetime score sum.
    pub fn for_total(total: u64) -> Self {
        match total {
            t if t >= 3000 => Rank::Expert,
            t if t >= 1500 => Rank::Specialist,
            t if t >= 500 => Rank::Knowledgeable,
            t if t >= 100 => Rank::Amateur,
            _ => Rank::NewMember,
        }
    }

    /// Recompute from scratch over a learner's results.
    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a TestResult>,
    {
        Self::for_total(lifetime_total(results))
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Rank::NewMember => "New member",
            Rank::Amateur => "Amateur",
            Rank::Knowledgeable => "Knowledgeable",
            Rank::Specialist => "Specialist",
            Rank::Expert => "Expert",
        };
        f.write_str(label)
    }
}

/// Sum of all scores, widened so long histories cannot overflow.
pub fn lifetime_total<'a, I>(results: I) -> u64
where
    I: IntoIterator<Item = &'a TestResult>,
{
    results.into_iter().map(|r| u64::from(r.score)).sum()
}

/// Best score a learner has reached on one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub learner_id: String,
    pub subject_id: String,
    /// Never decreases.
    pub percentage: u32,
    pub last_activity: DateTime<Utc>,
}

impl Progress {
    pub fn new(learner_id: &str, subject_id: &str, at: DateTime<Utc>) -> Self {
        Self {
            learner_id: learner_id.to_string(),
            subject_id: subject_id.to_string(),
            percentage: 0,
            last_activity: at,
        }
    }

    /// Fold in a new score: keep the maximum, always touch the activity time.
    pub fn record(&mut self, score: u32, at: DateTime<Utc>) {
        self.percentage = self.percentage.max(score.min(100));
        self.last_activity = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn result(score: u32) -> TestResult {
        TestResult {
            id: Uuid::new_v4(),
            learner_id: "ann".into(),
            subject_id: None,
            quiz_id: None,
            score,
            total_questions: 1,
            earned_points: 0,
            correct_count: 0,
            snapshot: None,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn thresholds() {
        assert_eq!(Rank::for_total(0), Rank::NewMember);
        assert_eq!(Rank::for_total(99), Rank::NewMember);
        assert_eq!(Rank::for_total(100), Rank::Amateur);
        assert_eq!(Rank::for_total(499), Rank::Amateur);
        assert_eq!(Rank::for_total(500), Rank::Knowledgeable);
        assert_eq!(Rank::for_total(1500), Rank::Specialist);
        assert_eq!(Rank::for_total(2999), Rank::Specialist);
        assert_eq!(Rank::for_total(3000), Rank::Expert);
    }

    #[test]
    fn display_names() {
        assert_eq!(Rank::NewMember.to_string(), "New member");
        assert_eq!(Rank::Knowledgeable.to_string(), "Knowledgeable");
    }

    #[test]
    fn rank_uses_sum_not_average() {
        let history: Vec<_> = (0..6).map(|_| result(90)).collect();
        assert_eq!(Rank::from_results(&history), Rank::Knowledgeable);
    }

    #[test]
    fn crossing_500_on_next_recompute() {
        let mut history: Vec<_> = (0..4).map(|_| result(100)).collect();
        history.push(result(99));
        assert_eq!(Rank::from_results(&history), Rank::Amateur);
        history.push(result(1));
        assert_eq!(Rank::from_results(&history), Rank::Knowledgeable);
        // Same history, same answer
        assert_eq!(Rank::from_results(&history), Rank::from_results(&history));
    }

    #[test]
    fn progress_is_monotonic() {
        let t0 = Utc::now();
        let mut progress = Progress::new("ann", "math", t0);
        for (score, expected) in [(40, 40), (70, 70), (10, 70), (70, 70), (95, 95), (0, 95)] {
            let before = progress.percentage;
            progress.record(score, Utc::now());
            assert_eq!(progress.percentage, expected);
            assert!(progress.percentage >= before);
        }
        assert!(progress.last_activity >= t0);
    }
}
