//! The `quizmark start` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use quizmark_core::store::MemoryStore;
use quizmark_providers::config::load_config_from;

use super::{build_engine, QuizSource};

pub async fn execute(
    source: QuizSource,
    learner: String,
    session_path: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let quiz = source.load()?;

    // Issuing questions records nothing, so no gradebook is opened.
    let engine = build_engine(&config, Arc::new(MemoryStore::new()));
    let issued = engine.start(&quiz, &learner).await?;

    if let Some(parent) = session_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&issued)?;
    std::fs::write(&session_path, json)
        .with_context(|| format!("failed to write session: {}", session_path.display()))?;

    println!("{} for {learner}\n", quiz.title);
    for (index, question) in issued.questions.iter().enumerate() {
        println!("[{index}] {}", question.question);
        for option in &question.options {
            println!("    {}) {}", option.label, option.text);
        }
    }

    println!("\nSession saved to: {}", session_path.display());
    println!("Answer in an [answers] table keyed by question number, e.g. 0 = \"A\", then run:");
    println!(
        "  quizmark grade {} --answers <file> --learner {learner} --session {}",
        source.as_flags(),
        session_path.display()
    );

    Ok(())
}
