//! Mock backends for testing without real API calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use quizmark_core::model::GeneratedQuestion;
use quizmark_core::traits::{
    GenerationRequest, GradeRequest, GradeResponse, Grader, QuestionGenerator,
};

use crate::assistant::{ChatModel, ChatRequest};

/// A chat backend that always answers with the same text.
pub struct MockChat {
    reply: String,
    call_count: AtomicU32,
    last_request: Mutex<Option<ChatRequest>>,
}

impl MockChat {
    pub fn with_reply(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for MockChat {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<String> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(self.reply.clone())
    }
}

/// A grader with a fixed or scripted sequence of scores.
///
/// A script is consumed front to back; once it runs out, the last score
/// repeats.
pub struct MockGrader {
    script: Mutex<VecDeque<u32>>,
    fallback: u32,
    call_count: AtomicU32,
    last_request: Mutex<Option<GradeRequest>>,
}

impl MockGrader {
    /// Always return `score`.
    pub fn fixed(score: u32) -> Self {
        Self::scripted(vec![score])
    }

    /// Return the given scores in turn.
    pub fn scripted(scores: Vec<u32>) -> Self {
        let fallback = scores.last().copied().unwrap_or(0);
        Self {
            script: Mutex::new(scores.into()),
            fallback,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<GradeRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl Grader for MockGrader {
    fn name(&self) -> &str {
        "mock"
    }

    async fn grade(&self, request: &GradeRequest) -> anyhow::Result<GradeResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap() = Some(request.clone());

        let score = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);

        Ok(GradeResponse::clamped(
            i64::from(score),
            format!("mock grade {score}"),
        ))
    }
}

/// A generator that hands out a fixed question list.
pub struct MockGenerator {
    questions: Vec<GeneratedQuestion>,
    call_count: AtomicU32,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl MockGenerator {
    pub fn new(questions: Vec<GeneratedQuestion>) -> Self {
        Self {
            questions,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuestionGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> anyhow::Result<Vec<GeneratedQuestion>> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(self.questions.iter().take(request.count()).cloned().collect())
    }
}
