//! Scoring rules.
//!
//! Pure integer arithmetic; every "ratio" is computed as a floor division so
//! results never depend on float rounding. The async parts (external grader,
//! syntax checker) live in the engine and feed their percentages back into
//! `fraction_of`.

use crate::model::{Answer, GeneratedQuestion, MatchPair, Question, QuestionKind, Submission};
use crate::results::{GradingMethod, QuestionOutcome, ScoreSheet, Snapshot, SnapshotEntry};

/// Share of points awarded for code that does not parse.
pub const SYNTAX_PARTIAL_CREDIT_PERCENT: u32 = 20;

/// `floor(points * percent / 100)`, with `percent` clamped to 100.
pub fn fraction_of(points: u32, percent: u32) -> u32 {
    (u64::from(points) * u64::from(percent.min(100)) / 100) as u32
}

/// `floor(100 * earned / possible)`, 0 when nothing was possible, capped at 100.
pub fn percentage(earned: u32, possible: u32) -> u32 {
    if possible == 0 {
        return 0;
    }
    ((u64::from(earned) * 100 / u64::from(possible)) as u32).min(100)
}

/// Full points iff the selected label equals the correct one exactly.
pub fn score_multiple_choice(selected: Option<&str>, correct: &str, points: u32) -> u32 {
    if selected == Some(correct) {
        points
    } else {
        0
    }
}

/// Number of stored pairs whose right value the learner reproduced at the
/// same (1-indexed) position.
pub fn count_matches(pairs: &[MatchPair], answer: Option<&Answer>) -> u32 {
    let Some(answer) = answer else {
        return 0;
    };
    pairs
        .iter()
        .enumerate()
        .filter(|(i, pair)| answer.at_position(i + 1) == Some(pair.right.as_str()))
        .count() as u32
}

/// `floor(points * matched / total)`; zero pairs award nothing.
pub fn score_matching(matched: u32, total: u32, points: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let earned = u64::from(points) * u64::from(matched.min(total)) / u64::from(total);
    earned as u32
}

/// Whether a free-text answer is missing or only whitespace.
pub fn is_blank(answer: Option<&str>) -> bool {
    answer.map_or(true, |a| a.trim().is_empty())
}

/// Score the question kinds that need no collaborator.
///
/// Returns `None` for free-text kinds, which the engine grades.
pub fn score_local(question: &Question, submission: &Submission) -> Option<QuestionOutcome> {
    let (earned, method) = match &question.kind {
        QuestionKind::MultipleChoice { correct, .. } => (
            score_multiple_choice(submission.text(&question.id), correct, question.points),
            GradingMethod::ExactMatch,
        ),
        QuestionKind::Matching { pairs } => {
            let matched = count_matches(pairs, submission.answer(&question.id));
            let total = pairs.len() as u32;
            (
                score_matching(matched, total, question.points),
                GradingMethod::Matching { matched, total },
            )
        }
        QuestionKind::Text { .. } | QuestionKind::Math { .. } | QuestionKind::Code { .. } => {
            return None
        }
    };
    Some(QuestionOutcome {
        question_id: question.id.clone(),
        earned,
        possible: question.points,
        method,
        feedback: None,
    })
}

/// Sum outcomes into a score sheet against the quiz's total possible points.
/// The earned total saturates at `u32::MAX`.
pub fn aggregate(outcomes: Vec<QuestionOutcome>, total_possible: u32) -> ScoreSheet {
    let earned: u64 = outcomes.iter().map(|o| u64::from(o.earned)).sum();
    let total_earned = u32::try_from(earned).unwrap_or(u32::MAX);
    let correct_count = outcomes.iter().filter(|o| o.is_full_credit()).count() as u32;
    ScoreSheet {
        final_score: percentage(total_earned, total_possible),
        total_earned,
        total_possible,
        correct_count,
        outcomes,
        snapshot: None,
    }
}

/// Score a generated quiz: one point per exact label match, answers keyed
/// by 0-based position. Always carries a snapshot.
pub fn score_generated(questions: &[GeneratedQuestion], submission: &Submission) -> ScoreSheet {
    let mut outcomes = Vec::with_capacity(questions.len());
    let mut entries = Vec::with_capacity(questions.len());

    for (i, q) in questions.iter().enumerate() {
        let given = submission.text_at(i);
        let is_correct = given == Some(q.correct_answer.as_str());
        outcomes.push(QuestionOutcome {
            question_id: i.to_string(),
            earned: u32::from(is_correct),
            possible: 1,
            method: GradingMethod::ExactMatch,
            feedback: None,
        });
        entries.push(SnapshotEntry {
            question: q.question.clone(),
            options: q.options.clone(),
            correct_answer: q.correct_answer.clone(),
            learner_answer: given.map(String::from),
            is_correct,
        });
    }

    let mut sheet = aggregate(outcomes, questions.len() as u32);
    sheet.snapshot = Some(Snapshot { entries });
    sheet
}
