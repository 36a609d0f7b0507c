//! OpenAI-compatible chat completions backend.
//!
//! Works with any service exposing `/v1/chat/completions` (OpenAI, Groq,
//! OpenRouter, local gateways). Models are tried in order until one answers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use quizmark_core::error::ProviderError;

use crate::assistant::{ChatModel, ChatRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// OpenAI-compatible chat backend with an ordered model fallback list.
pub struct OpenAiChat {
    api_key: String,
    base_url: String,
    models: Vec<String>,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(
        api_key: &str,
        base_url: Option<String>,
        models: Vec<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        let models = if models.is_empty() {
            vec![DEFAULT_MODEL.to_string()]
        } else {
            models
        };

        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            models,
            client,
        })
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    #[instrument(skip(self, request))]
    async fn try_model(&self, model: &str, request: &ChatRequest) -> Result<String, ProviderError> {
        let body = OpenAiRequest {
            model: model.to_string(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: request.user.clone(),
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(DEFAULT_TIMEOUT_SECS)
                } else {
                    ProviderError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5)
                * 1000;
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry_after,
            });
        }
        if status == 401 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::AuthenticationFailed(body));
        }
        if status == 404 {
            return Err(ProviderError::ModelNotFound(model.to_string()));
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status,
                message: body,
            });
        }

        let api_response: OpenAiResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::ApiError {
                    status: 0,
                    message: format!("failed to parse response: {e}"),
                })?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ProviderError::MalformedReply("empty completion".into()))
    }
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<OpenAiMessage>,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<String> {
        let mut last_error = None;

        for model in &self.models {
            match self.try_model(model, request).await {
                Ok(content) => return Ok(content),
                // A bad key fails every model the same way
                Err(e @ ProviderError::AuthenticationFailed(_)) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!("model {model} failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ProviderError::NotConfigured("no models listed".into()))
            .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatRequest {
        ChatRequest {
            system: "grade".into(),
            user: "answer".into(),
            max_tokens: 100,
            temperature: 0.0,
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"content": content, "role": "assistant"}, "index": 0}],
            "model": "gpt-4.1-mini",
        })
    }

    #[tokio::test]
    async fn successful_chat() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("{\"score\": 90, \"feedback\": \"ok\"}")),
            )
            .mount(&server)
            .await;

        let chat = OpenAiChat::new("test-key", Some(server.uri()), vec![]).unwrap();
        let content = chat.chat(&request()).await.unwrap();
        assert!(content.contains("\"score\": 90"));
        assert_eq!(chat.models(), [DEFAULT_MODEL]);
    }

    #[tokio::test]
    async fn falls_back_to_next_model() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({"model": "first"})))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({"model": "second"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("from second")))
            .expect(1)
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(
            "key",
            Some(server.uri()),
            vec!["first".into(), "second".into()],
        )
        .unwrap();
        assert_eq!(chat.chat(&request()).await.unwrap(), "from second");
    }

    #[tokio::test]
    async fn authentication_failure_stops_the_walk() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .expect(1)
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(
            "bad",
            Some(server.uri()),
            vec!["first".into(), "second".into()],
        )
        .unwrap();
        let err = chat.chat(&request()).await.unwrap_err();
        let provider_error = err.downcast_ref::<ProviderError>().unwrap();
        assert!(provider_error.is_permanent());
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_hint() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
            .mount(&server)
            .await;

        let chat = OpenAiChat::new("key", Some(server.uri()), vec![]).unwrap();
        let err = chat.chat(&request()).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProviderError>().unwrap().retry_after_ms(),
            Some(3000)
        );
    }

    #[tokio::test]
    async fn unknown_model_maps_to_model_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let chat = OpenAiChat::new("key", Some(server.uri()), vec!["gone".into()]).unwrap();
        let err = chat.chat(&request()).await.unwrap_err();
        assert!(err.to_string().contains("model not found: gone"));
    }

    #[tokio::test]
    async fn empty_completion_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let chat = OpenAiChat::new("key", Some(server.uri()), vec![]).unwrap();
        let err = chat.chat(&request()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::MalformedReply(_))
        ));
    }
}
