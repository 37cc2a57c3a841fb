//! LLM oracle
//!
//! The language model is a text→text oracle reached over HTTP; the
//! bundled client speaks the Ollama chat API with streaming off.
//! Generation parameters (temperature, top-p, token ceiling) come from
//! configuration; a timeout turns into a distinguished error kind so
//! the caller can fall back instead of hanging a request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use aerolex_common::{AerolexError, Result};

use crate::config::LlmConfig;

/// Text→text oracle.
#[async_trait]
pub trait LlmOracle: Send + Sync {
    /// Generate a completion for `prompt` under `system` instructions.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// HTTP client for an Ollama-compatible chat endpoint.
pub struct OllamaClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl OllamaClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AerolexError::LlmOracle(format!("failed to build LLM client: {e}")))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl LlmOracle for OllamaClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.config.endpoint.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                num_predict: self.config.max_tokens,
            },
        };

        debug!(
            model = %self.config.model,
            temperature = self.config.temperature,
            "Calling LLM oracle"
        );

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AerolexError::LlmTimeout(self.config.timeout_secs)
                } else {
                    AerolexError::LlmOracle(format!("LLM request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AerolexError::LlmOracle(format!(
                "oracle returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AerolexError::LlmOracle(format!("malformed LLM response: {e}")))?;

        Ok(parsed.message.content)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OllamaClient {
        OllamaClient::new(LlmConfig {
            endpoint: server.uri(),
            model: "llama3.1:8b".to_string(),
            temperature: 0.3,
            top_p: 0.9,
            max_tokens: 500,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "llama3.1:8b",
                "stream": false,
                "options": {"temperature": 0.3, "top_p": 0.9, "num_predict": 500},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"role": "assistant", "content": "Baseado nas normas, sim."},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let answer = client.generate("Você é um assistente.", "Pode?").await.unwrap();
        assert_eq!(answer, "Baseado nas normas, sim.");
    }

    #[tokio::test]
    async fn test_generate_error_kind() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.generate("sys", "q").await.unwrap_err();
        assert_eq!(err.kind(), "llm_oracle_error");
    }

    #[tokio::test]
    async fn test_messages_carry_system_and_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "messages": [
                    {"role": "system", "content": "instrução"},
                    {"role": "user", "content": "pergunta"},
                ],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"content": "ok"},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.generate("instrução", "pergunta").await.unwrap();
    }
}
