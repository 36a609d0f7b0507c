//! The `quizmark grade` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use quizmark_core::parser;
use quizmark_core::results::{GradingMethod, ScoreSheet};
use quizmark_core::session::IssuedQuiz;
use quizmark_providers::config::load_config_from;

use super::{build_engine, open_store, QuizSource};

pub async fn execute(
    source: QuizSource,
    answers_path: PathBuf,
    learner: String,
    session_path: Option<PathBuf>,
    store_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let quiz = source.load()?;
    let submission = parser::parse_answers(&answers_path)?;

    let store = Arc::new(open_store(&config, store_path)?);
    let engine = build_engine(&config, store);

    // A missing session file leaves nothing issued, which the engine reports
    // as an expired session.
    if quiz.is_dynamic() {
        if let Some(path) = session_path.as_ref().filter(|p| p.exists()) {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read session: {}", path.display()))?;
            let issued: IssuedQuiz = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse session: {}", path.display()))?;
            engine.resume(issued);
        }
    }

    let submitted = engine.submit_detailed(&quiz, &submission, &learner).await?;

    if quiz.is_dynamic() {
        if let Some(path) = &session_path {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!("could not remove session {}: {e}", path.display());
            }
        }
    }

    print_breakdown(&submitted.sheet);

    let result = submitted.result();
    println!(
        "\n{}: {} of {} correct",
        quiz.title, result.correct_count, result.total_questions
    );
    println!("Score: {}%", result.score);
    if let Some(progress) = &submitted.outcome.progress {
        println!(
            "Progress in {}: {}%",
            progress.subject_id, progress.percentage
        );
    }
    println!("Rank: {}", submitted.outcome.rank);

    Ok(())
}

fn print_breakdown(sheet: &ScoreSheet) {
    let mut table = Table::new();
    table.set_header(vec!["Question", "Points", "Method", "Feedback"]);

    for outcome in &sheet.outcomes {
        let method = match &outcome.method {
            GradingMethod::ExactMatch => "exact match".to_string(),
            GradingMethod::Matching { matched, total } => format!("matched {matched}/{total}"),
            GradingMethod::SyntaxRejected { .. } => "syntax error".to_string(),
            GradingMethod::External { percentage } => format!("graded {percentage}%"),
            GradingMethod::Degraded { .. } => "grader unavailable".to_string(),
            GradingMethod::Unanswered => "unanswered".to_string(),
        };
        let feedback = match &outcome.method {
            GradingMethod::SyntaxRejected { message } => message.clone().unwrap_or_default(),
            GradingMethod::Degraded { reason } => reason.clone(),
            _ => outcome.feedback.clone().unwrap_or_default(),
        };
        table.add_row(vec![
            Cell::new(&outcome.question_id),
            Cell::new(format!("{}/{}", outcome.earned, outcome.possible)),
            Cell::new(method),
            Cell::new(feedback),
        ]);
    }

    println!("{table}");
}
