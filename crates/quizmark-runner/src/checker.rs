//! Running a language toolchain over an answer file.

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;

use quizmark_core::model::CodeLanguage;
use quizmark_core::traits::SyntaxVerdict;

use crate::sandbox::Sandbox;

/// Error names that mark a genuine syntax problem in checker output.
const SYNTAX_MARKERS: &[&str] = &["SyntaxError", "IndentationError", "TabError"];

const PYTHON_PARSE_SNIPPET: &str =
    "import ast, sys; ast.parse(open(sys.argv[1], encoding='utf-8').read(), sys.argv[1])";

/// Interpreter commands used for each supported language.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub python: String,
    pub node: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            node: "node".to_string(),
        }
    }
}

impl Toolchain {
    /// Program and arguments that parse `file` without running it.
    pub fn command_for(
        &self,
        language: CodeLanguage,
        file: &Path,
    ) -> Option<(String, Vec<String>)> {
        let file = file.to_string_lossy().into_owned();
        match language {
            CodeLanguage::Python => Some((
                self.python.clone(),
                vec!["-c".to_string(), PYTHON_PARSE_SNIPPET.to_string(), file],
            )),
            CodeLanguage::JavaScript => {
                Some((self.node.clone(), vec!["--check".to_string(), file]))
            }
            _ => None,
        }
    }
}

/// Write `code` into the sandbox and parse it with the language toolchain.
pub async fn check_source(
    sandbox: &Sandbox,
    toolchain: &Toolchain,
    code: &str,
) -> Result<SyntaxVerdict> {
    let file = sandbox.write_source(code)?;
    let Some((program, args)) = toolchain.command_for(sandbox.language(), &file) else {
        bail!("no syntax checker for {}", sandbox.language());
    };

    let mut cmd = Command::new(&program);
    cmd.args(&args)
        .current_dir(sandbox.work_dir())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in sandbox.build_env() {
        cmd.env(key, value);
    }

    let output = tokio::time::timeout(sandbox.timeout(), cmd.output())
        .await
        .with_context(|| {
            format!(
                "syntax check timed out after {}s",
                sandbox.timeout().as_secs()
            )
        })?
        .with_context(|| format!("failed to run {program}"))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    classify(output.status.success(), &stderr)
}

/// Turn a finished checker run into a verdict.
///
/// Failures that do not name a syntax error are reported as errors so the
/// answer can still be graded.
pub fn classify(success: bool, stderr: &str) -> Result<SyntaxVerdict> {
    if success {
        return Ok(SyntaxVerdict::valid());
    }

    if let Some(line) = diagnostic_line(stderr) {
        return Ok(SyntaxVerdict::invalid(line));
    }

    let first = stderr
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no output");
    bail!("syntax checker failed: {first}")
}

fn diagnostic_line(stderr: &str) -> Option<String> {
    stderr
        .lines()
        .map(str::trim)
        .find(|line| SYNTAX_MARKERS.iter().any(|m| line.starts_with(m)))
        .or_else(|| {
            stderr
                .lines()
                .map(str::trim)
                .find(|line| SYNTAX_MARKERS.iter().any(|m| line.contains(m)))
        })
        .map(str::to_string)
}
