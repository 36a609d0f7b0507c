//! Grading and question generation on top of any chat backend.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use quizmark_core::model::GeneratedQuestion;
use quizmark_core::traits::{
    GenerationRequest, GradeRequest, GradeResponse, Grader, QuestionGenerator,
};

use crate::reply::{parse_grade_reply, parse_question_reply};

/// Characters of teaching material sent along with a drafting request.
pub const MATERIAL_CHAR_LIMIT: usize = 2000;

const GRADER_SYSTEM_PROMPT: &str = "You are a teacher grading a student's answer. Judge correctness and completeness against the question and the model answer. Respond ONLY with a JSON object of the form {\"score\": <integer 0-100>, \"feedback\": \"<one or two sentences>\"}.";
const GENERATOR_SYSTEM_PROMPT: &str = "You are a teacher writing multiple-choice test questions. Respond ONLY with a JSON array. Every element must have the English keys \"question\", \"options\" (an object with keys A, B, C, D) and \"correct_answer\" (the correct option label).";

/// One chat exchange.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// A backend that answers a system + user prompt with text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Human-readable backend name (e.g. "openai").
    fn name(&self) -> &str;

    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<String>;
}

/// Grader and question generator backed by a chat model.
pub struct LlmAssistant {
    chat: Arc<dyn ChatModel>,
}

impl LlmAssistant {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }
}

fn grading_prompt(request: &GradeRequest) -> String {
    format!(
        "Question: {}\nModel answer: {}\nStudent answer: {}\n\nGrade the student answer from 0 to 100.",
        request.question,
        request.reference_answer.as_deref().unwrap_or("(none provided)"),
        request.answer
    )
}

fn generation_prompt(request: &GenerationRequest) -> String {
    match request {
        GenerationRequest::Topic {
            topic,
            grade_level,
            count,
        } => format!(
            "Write {count} multiple-choice questions.\nTopic: {topic}\nAudience: grade {grade_level} students."
        ),
        GenerationRequest::Material { text, count } => {
            let excerpt: String = text.chars().take(MATERIAL_CHAR_LIMIT).collect();
            format!(
                "Write {count} multiple-choice questions about the following text.\n\nText:\n{excerpt}"
            )
        }
    }
}

#[async_trait]
impl Grader for LlmAssistant {
    fn name(&self) -> &str {
        self.chat.name()
    }

    #[instrument(skip_all, fields(backend = %self.chat.name()))]
    async fn grade(&self, request: &GradeRequest) -> anyhow::Result<GradeResponse> {
        let reply = self
            .chat
            .chat(&ChatRequest {
                system: GRADER_SYSTEM_PROMPT.to_string(),
                user: grading_prompt(request),
                max_tokens: 500,
                temperature: 0.2,
            })
            .await?;
        Ok(parse_grade_reply(&reply)?)
    }
}

#[async_trait]
impl QuestionGenerator for LlmAssistant {
    fn name(&self) -> &str {
        self.chat.name()
    }

    #[instrument(skip_all, fields(backend = %self.chat.name(), count = request.count()))]
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> anyhow::Result<Vec<GeneratedQuestion>> {
        let reply = self
            .chat
            .chat(&ChatRequest {
                system: GENERATOR_SYSTEM_PROMPT.to_string(),
                user: generation_prompt(request),
                max_tokens: 4000,
                temperature: 0.7,
            })
            .await?;
        let questions = parse_question_reply(&reply)?;
        tracing::debug!("generated {} questions", questions.len());
        Ok(questions)
    }
}
