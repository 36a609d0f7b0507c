//! quizmark-providers: LLM-backed graders and question generators.
//!
//! Wraps OpenAI-compatible and Ollama chat backends behind the core
//! `Grader` and `QuestionGenerator` traits.

pub mod assistant;
pub mod config;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod reply;

pub use assistant::{ChatModel, ChatRequest, LlmAssistant};
pub use config::{
    create_assistant, load_config, load_config_from, OfflineGrader, ProviderConfig,
    QuizmarkConfig,
};
pub use quizmark_core::error::ProviderError;
