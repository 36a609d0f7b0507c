//! Local syntax checking of code answers.
//!
//! Each answer is written into its own temporary directory and parsed (never
//! executed) by the language toolchain, with a timeout and a scrubbed
//! environment. Python and JavaScript are supported.

pub mod checker;
pub mod sandbox;

use std::time::Duration;

use async_trait::async_trait;

use quizmark_core::model::CodeLanguage;
use quizmark_core::traits::{SyntaxCheckRequest, SyntaxChecker, SyntaxVerdict};

use crate::checker::{check_source, Toolchain};
use crate::sandbox::Sandbox;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Syntax checker that shells out to locally installed interpreters.
pub struct LocalSyntaxChecker {
    timeout: Duration,
    toolchain: Toolchain,
}

impl LocalSyntaxChecker {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            toolchain: Toolchain::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = toolchain;
        self
    }
}

impl Default for LocalSyntaxChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyntaxChecker for LocalSyntaxChecker {
    fn supports(&self, language: CodeLanguage) -> bool {
        matches!(language, CodeLanguage::Python | CodeLanguage::JavaScript)
    }

    #[tracing::instrument(skip(self, request), fields(language = %request.language))]
    async fn check(&self, request: &SyntaxCheckRequest) -> anyhow::Result<SyntaxVerdict> {
        let sandbox = Sandbox::new(request.language, self.timeout)?;
        let verdict = check_source(&sandbox, &self.toolchain, &request.code).await?;
        tracing::debug!(valid = verdict.valid, "syntax check finished");
        Ok(verdict)
    }
}
