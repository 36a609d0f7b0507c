//! Read-side commands: `rank`, `progress`, `leaderboard`, `remove-learner`.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use quizmark_core::progress::lifetime_total;
use quizmark_core::statistics::{self, LearnerSummary, COMPLETION_THRESHOLD};
use quizmark_core::store::GradebookStore;
use quizmark_providers::config::load_config_from;

use super::open_store;

pub async fn rank(
    learner: String,
    store_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = open_store(&config, store_path)?;

    let rank = store.recompute_rank(&learner).await?;
    let results = store.results_for(&learner).await?;

    println!("Learner: {learner}");
    println!("Total score: {}", lifetime_total(&results));
    println!("Rank: {rank}");
    Ok(())
}

pub async fn progress(
    learner: String,
    store_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = open_store(&config, store_path)?;

    let results = store.results_for(&learner).await?;
    let progress = store.progress_for(&learner).await?;

    if results.is_empty() {
        println!("No results recorded for {learner}.");
        return Ok(());
    }

    if !progress.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Subject", "Best %", "Completed", "Last activity"]);
        for p in &progress {
            table.add_row(vec![
                Cell::new(&p.subject_id),
                Cell::new(format!("{}%", p.percentage)),
                Cell::new(if p.percentage >= COMPLETION_THRESHOLD {
                    "yes"
                } else {
                    "no"
                }),
                Cell::new(p.last_activity.format("%Y-%m-%d %H:%M")),
            ]);
        }
        println!("{table}");
    }

    let mut best = Table::new();
    best.set_header(vec!["Quiz", "Best score"]);
    for (quiz, score) in statistics::best_scores_by_quiz(&results) {
        best.add_row(vec![Cell::new(quiz), Cell::new(format!("{score}%"))]);
    }
    println!("{best}");

    let summary = LearnerSummary::new(&learner, &results, &progress);
    println!("\nLearner: {}", summary.learner_id);
    println!("Tests taken: {}", summary.tests_taken);
    println!("Average score: {}%", summary.average_score);
    println!("Overall progress: {}%", summary.overall_progress);
    println!("Completed subjects: {}", summary.completed_subjects);
    println!("Total score: {} ({})", summary.total_score, summary.rank);
    Ok(())
}

pub async fn leaderboard(
    limit: usize,
    store_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = open_store(&config, store_path)?;

    let entries = statistics::leaderboard(&store.all_results().await?);
    if entries.is_empty() {
        println!("No results recorded yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Learner", "Total", "Tests", "Level", "Rank"]);
    for (position, entry) in entries.iter().take(limit).enumerate() {
        table.add_row(vec![
            Cell::new(position + 1),
            Cell::new(&entry.learner_id),
            Cell::new(entry.total_score),
            Cell::new(entry.tests_taken),
            Cell::new(entry.level),
            Cell::new(entry.rank),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn remove_learner(
    learner: String,
    store_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = open_store(&config, store_path)?;

    let removed = store.remove_learner(&learner).await?;
    println!("Removed {removed} result(s) for {learner}.");
    Ok(())
}
