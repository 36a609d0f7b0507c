//! The `quizmark draft` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use quizmark_core::parser::{draft_quiz, quiz_to_toml, validate_quiz};
use quizmark_core::traits::{GenerationRequest, QuestionGenerator};
use quizmark_providers::config::load_config_from;

pub async fn execute(
    material_path: PathBuf,
    id: String,
    title: String,
    subject: Option<String>,
    count: usize,
    output: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(count >= 1, "count must be at least 1");

    let config = load_config_from(config_path.as_deref())?;
    let Some(assistant) = config.default_assistant()? else {
        anyhow::bail!(
            "provider '{}' not found in config. Run `quizmark init` and add an API key.",
            config.default_provider
        );
    };

    let text = std::fs::read_to_string(&material_path)
        .with_context(|| format!("failed to read material: {}", material_path.display()))?;
    anyhow::ensure!(!text.trim().is_empty(), "material file is empty");

    eprintln!("Drafting {count} questions with {}...", assistant.name());
    let generated = assistant
        .generate(&GenerationRequest::Material { text, count })
        .await
        .context("question generation failed")?;

    let quiz = draft_quiz(&id, &title, subject.as_deref(), generated);
    anyhow::ensure!(
        !quiz.questions.is_empty(),
        "the provider returned no usable questions"
    );

    for w in validate_quiz(&quiz) {
        let prefix = w.question_id.map(|id| format!("[{id}] ")).unwrap_or_default();
        eprintln!("{prefix}WARNING: {}", w.message);
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output, quiz_to_toml(&quiz)?)
        .with_context(|| format!("failed to write quiz: {}", output.display()))?;

    println!(
        "Drafted {} questions into {}",
        quiz.questions.len(),
        output.display()
    );
    Ok(())
}
