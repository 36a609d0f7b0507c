//! Error types shared across the workspace.
//!
//! `ProviderError` lives here rather than in `quizmark-providers` so the
//! grading engine can downcast grader failures and decide whether a retry
//! is worthwhile without string matching.

use thiserror::Error;

/// Errors that can occur when talking to an LLM backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The model answered, but not with anything we could parse.
    #[error("malformed model reply: {0}")]
    MalformedReply(String),

    /// No backend is configured at all.
    #[error("no provider configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProviderError::AuthenticationFailed(_)
                | ProviderError::ModelNotFound(_)
                | ProviderError::NotConfigured(_)
        )
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// Failures of the gradebook store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("gradebook I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("gradebook (de)serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Whole-submission failures surfaced to the caller.
///
/// Per-question grading problems never show up here; they degrade that
/// question to zero points instead.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The generated question set for a dynamic quiz is gone (never issued,
    /// already submitted, or issued for another quiz).
    #[error("session expired: no issued questions for quiz '{quiz_id}'")]
    SessionExpired { quiz_id: String },

    #[error("quiz not found: {0}")]
    QuizNotFound(String),

    /// Only quizzes with generation parameters can be started.
    #[error("quiz '{0}' is not generated per learner")]
    NotDynamic(String),

    /// The result could not be recorded; nothing was committed.
    #[error("failed to record result: {0}")]
    Store(#[from] StoreError),
}
