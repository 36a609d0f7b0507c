//! Scratch directory for checking a single code answer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tempfile::TempDir;

use quizmark_core::model::CodeLanguage;

/// Environment variables blanked out for every checker process.
const SCRUBBED_ENV: &[&str] = &[
    "SSH_AUTH_SOCK",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "GITHUB_TOKEN",
    "GH_TOKEN",
    "OPENAI_API_KEY",
    "GROQ_API_KEY",
    "QUIZMARK_API_KEY",
    "DATABASE_URL",
    "NPM_TOKEN",
];

/// A temporary directory holding one answer file.
///
/// On drop, the directory is removed.
pub struct Sandbox {
    work_dir: TempDir,
    timeout: Duration,
    language: CodeLanguage,
}

impl Sandbox {
    pub fn new(language: CodeLanguage, timeout: Duration) -> Result<Self> {
        let work_dir = TempDir::new().context("failed to create temp directory")?;
        Ok(Self {
            work_dir,
            timeout,
            language,
        })
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn language(&self) -> CodeLanguage {
        self.language
    }

    /// Write the answer to a file named for its language and return its path.
    pub fn write_source(&self, code: &str) -> Result<PathBuf> {
        let filename = match self.language {
            CodeLanguage::Python => "answer.py",
            CodeLanguage::JavaScript => "answer.js",
            CodeLanguage::TypeScript => "answer.ts",
            CodeLanguage::Rust => "answer.rs",
            CodeLanguage::Go => "answer.go",
            CodeLanguage::Cpp => "answer.cpp",
            CodeLanguage::Java => "Answer.java",
        };
        let path = self.work_dir.path().join(filename);
        std::fs::write(&path, code).with_context(|| format!("failed to write {filename}"))?;
        Ok(path)
    }

    /// Environment overrides for checker processes.
    pub fn build_env(&self) -> Vec<(String, String)> {
        let mut env = vec![("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string())];
        for var in SCRUBBED_ENV {
            env.push((var.to_string(), String::new()));
        }
        env
    }
}
