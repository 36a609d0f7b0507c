//! Configuration and backend factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use quizmark_core::engine::GradingEngineConfig;
use quizmark_core::error::ProviderError;
use quizmark_core::model::CodeLanguage;
use quizmark_core::traits::{GradeRequest, GradeResponse, Grader};

use crate::assistant::{ChatModel, LlmAssistant};
use crate::ollama::{self, OllamaChat};
use crate::openai::{self, OpenAiChat};

/// Configuration for a single chat backend.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        /// Tried in order until one answers.
        #[serde(default = "default_openai_models")]
        models: Vec<String>,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        #[serde(default = "default_ollama_model")]
        model: String,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::OpenAI {
                api_key: _,
                base_url,
                models,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("models", models)
                .finish(),
            ProviderConfig::Ollama { base_url, model } => f
                .debug_struct("Ollama")
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
        }
    }
}

fn default_openai_models() -> Vec<String> {
    vec![openai::DEFAULT_MODEL.to_string()]
}
fn default_ollama_url() -> String {
    ollama::DEFAULT_BASE_URL.to_string()
}
fn default_ollama_model() -> String {
    ollama::DEFAULT_MODEL.to_string()
}

/// Top-level quizmark configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizmarkConfig {
    /// Backend configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Backend used for grading and question generation.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Upper bound on one grader call, in seconds.
    #[serde(default = "default_grader_timeout")]
    pub grader_timeout_secs: u64,
    /// Max retries on grader errors.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Max concurrent grader calls per submission.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Gradebook file.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Language assumed for code questions that do not name one.
    #[serde(default = "default_code_language")]
    pub default_code_language: CodeLanguage,
    /// Upper bound on one local syntax check, in seconds.
    #[serde(default = "default_syntax_check_timeout")]
    pub syntax_check_timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_grader_timeout() -> u64 {
    20
}
fn default_retries() -> u32 {
    1
}
fn default_retry_delay() -> u64 {
    500
}
fn default_parallelism() -> usize {
    4
}
fn default_store_path() -> PathBuf {
    PathBuf::from("./quizmark-data/gradebook.json")
}
fn default_code_language() -> CodeLanguage {
    CodeLanguage::Python
}
fn default_syntax_check_timeout() -> u64 {
    10
}

impl Default for QuizmarkConfig {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider(),
            grader_timeout_secs: default_grader_timeout(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            parallelism: default_parallelism(),
            store_path: default_store_path(),
            default_code_language: default_code_language(),
            syntax_check_timeout_secs: default_syntax_check_timeout(),
        }
    }
}

impl QuizmarkConfig {
    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> GradingEngineConfig {
        GradingEngineConfig {
            parallelism: self.parallelism.max(1),
            grader_timeout: Duration::from_secs(self.grader_timeout_secs),
            max_grader_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            default_code_language: self.default_code_language,
        }
    }

    pub fn syntax_check_timeout(&self) -> Duration {
        Duration::from_secs(self.syntax_check_timeout_secs)
    }

    /// Build the assistant for `default_provider`, or `None` when that
    /// provider is not configured.
    pub fn default_assistant(&self) -> Result<Option<Arc<LlmAssistant>>> {
        match self.providers.get(&self.default_provider) {
            Some(provider) => Ok(Some(create_assistant(provider)?)),
            None => Ok(None),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Resolve env vars in a provider config.
fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            models,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
            models: models.clone(),
        },
        ProviderConfig::Ollama { base_url, model } => ProviderConfig::Ollama {
            base_url: resolve_env_vars(base_url),
            model: model.clone(),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `quizmark.toml` in the current directory
/// 2. `~/.config/quizmark/config.toml`
///
/// Environment variable override: `QUIZMARK_API_KEY` (the `openai` provider).
pub fn load_config() -> Result<QuizmarkConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<QuizmarkConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("quizmark.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<QuizmarkConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => QuizmarkConfig::default(),
    };

    apply_env_overrides(&mut config, std::env::var("QUIZMARK_API_KEY").ok());

    // Resolve env vars in all provider configs
    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();

    Ok(config)
}

fn apply_env_overrides(config: &mut QuizmarkConfig, api_key: Option<String>) {
    let Some(key) = api_key else {
        return;
    };
    let entry = config
        .providers
        .entry("openai".into())
        .or_insert(ProviderConfig::OpenAI {
            api_key: String::new(),
            base_url: None,
            models: default_openai_models(),
        });
    if let ProviderConfig::OpenAI { api_key, .. } = entry {
        *api_key = key;
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("quizmark"))
}

/// Create a chat backend from its configuration.
pub fn create_chat_model(config: &ProviderConfig) -> Result<Arc<dyn ChatModel>> {
    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            models,
        } => {
            if api_key.is_empty() {
                anyhow::bail!("openai provider has no api_key (set QUIZMARK_API_KEY)");
            }
            Ok(Arc::new(OpenAiChat::new(
                api_key,
                base_url.clone(),
                models.clone(),
            )?))
        }
        ProviderConfig::Ollama { base_url, model } => {
            Ok(Arc::new(OllamaChat::new(base_url, model)?))
        }
    }
}

/// Create a grader and question generator from a backend configuration.
pub fn create_assistant(config: &ProviderConfig) -> Result<Arc<LlmAssistant>> {
    Ok(Arc::new(LlmAssistant::new(create_chat_model(config)?)))
}

/// Stand-in grader used when no backend is configured. Every call fails
/// permanently, so free-text answers score zero without retries.
pub struct OfflineGrader;

#[async_trait]
impl Grader for OfflineGrader {
    fn name(&self) -> &str {
        "offline"
    }

    async fn grade(&self, _: &GradeRequest) -> anyhow::Result<GradeResponse> {
        Err(ProviderError::NotConfigured("free-text grading is unavailable".into()).into())
    }
}
