pub mod draft;
pub mod grade;
pub mod init;
pub mod standing;
pub mod start;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use quizmark_core::engine::GradingEngine;
use quizmark_core::model::Quiz;
use quizmark_core::parser::{self, QuizCatalog};
use quizmark_core::store::{GradebookStore, JsonFileStore};
use quizmark_core::traits::Grader;
use quizmark_providers::{OfflineGrader, QuizmarkConfig};
use quizmark_runner::LocalSyntaxChecker;

/// Open the gradebook at `override_path`, or at the configured location.
pub fn open_store(
    config: &QuizmarkConfig,
    override_path: Option<PathBuf>,
) -> Result<JsonFileStore> {
    let path = override_path.unwrap_or_else(|| config.store_path.clone());
    JsonFileStore::open(&path)
        .with_context(|| format!("failed to open gradebook: {}", path.display()))
}

/// Wire an engine from configuration.
///
/// Without a usable provider, free-text answers score zero and generated
/// quizzes get placeholder questions.
pub fn build_engine(config: &QuizmarkConfig, store: Arc<dyn GradebookStore>) -> GradingEngine {
    let checker = Arc::new(LocalSyntaxChecker::new().with_timeout(config.syntax_check_timeout()));

    let assistant = match config.default_assistant() {
        Ok(assistant) => assistant,
        Err(e) => {
            tracing::warn!("provider '{}' unavailable: {e:#}", config.default_provider);
            None
        }
    };

    let engine = match assistant {
        Some(assistant) => {
            let grader: Arc<dyn Grader> = assistant.clone();
            GradingEngine::new(grader, checker, store, config.engine_config())
                .with_generator(assistant)
        }
        None => {
            eprintln!(
                "No usable provider '{}': free-text answers will score 0.",
                config.default_provider
            );
            GradingEngine::new(Arc::new(OfflineGrader), checker, store, config.engine_config())
        }
    };
    engine
}

/// Where a command finds its quiz: a single file, or an id looked up in a
/// directory of quizzes.
#[derive(Debug, Args)]
pub struct QuizSource {
    /// Quiz file
    #[arg(long, required_unless_present = "quiz_id", conflicts_with = "quiz_id")]
    pub quiz: Option<PathBuf>,

    /// Directory of quiz files to look `--quiz-id` up in
    #[arg(long, requires = "quiz_id")]
    pub quizzes: Option<PathBuf>,

    /// Id of a quiz under `--quizzes`
    #[arg(long, requires = "quizzes")]
    pub quiz_id: Option<String>,
}

impl QuizSource {
    pub fn load(&self) -> Result<Quiz> {
        match (&self.quiz, &self.quizzes, &self.quiz_id) {
            (Some(path), _, _) => load_quiz(path),
            (None, Some(dir), Some(id)) => {
                let catalog = QuizCatalog::load(dir)
                    .with_context(|| format!("failed to load quizzes: {}", dir.display()))?;
                Ok(catalog.get(id)?.clone())
            }
            _ => anyhow::bail!("pass --quiz <file> or --quizzes <dir> --quiz-id <id>"),
        }
    }

    /// The same source spelled as command-line flags.
    pub fn as_flags(&self) -> String {
        match (&self.quiz, &self.quizzes, &self.quiz_id) {
            (Some(path), _, _) => format!("--quiz {}", path.display()),
            (None, Some(dir), Some(id)) => format!("--quizzes {} --quiz-id {id}", dir.display()),
            _ => String::new(),
        }
    }
}

/// Load a quiz file and fail on anything but a regular file.
pub fn load_quiz(path: &Path) -> Result<Quiz> {
    anyhow::ensure!(path.is_file(), "quiz file not found: {}", path.display());
    parser::parse_quiz(path)
}
