//! OpenAI API client implementation
//!
//! Implements the LlmClient trait for OpenAI's Chat Completions API using
//! server-sent events.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, StreamChunk, TokenUsage};
use crate::config::LlmConfig;

/// OpenAI API client
pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    timeout: Option<Duration>,
}

impl OpenAIClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from environment variable or file specified in config.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(provider = %config.provider, model = %config.model(), "OpenAIClient::from_config: called");
        let api_key = config.get_api_key().map_err(|e| LlmError::Config(e.to_string()))?;
        Self::new(config.model(), api_key, config.base_url(), config.timeout())
    }

    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, LlmError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(LlmError::Network)?;

        Ok(Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            timeout,
        })
    }

    /// Build the request body for the OpenAI API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, message_count = %request.messages.len(), "build_request_body: called");
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|turn| {
                serde_json::json!({
                    "role": turn.role.as_str(),
                    "content": turn.content,
                })
            })
            .collect();

        let sampling = &request.sampling;
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": sampling.temperature,
            "presence_penalty": sampling.presence_penalty,
            "frequency_penalty": sampling.frequency_penalty,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        // GPT-5.x and o1/o3 models use max_completion_tokens instead of max_tokens
        let uses_completion_tokens =
            self.model.starts_with("gpt-5") || self.model.starts_with("o1") || self.model.starts_with("o3");
        if uses_completion_tokens {
            body["max_completion_tokens"] = serde_json::json!(sampling.max_tokens);
        } else {
            body["max_tokens"] = serde_json::json!(sampling.max_tokens);
        }

        body
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, "OpenAIClient::stream: called");
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let http_request = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body);

        let mut es = EventSource::new(http_request).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let mut full_content = String::new();
        let mut stop_reason = StopReason::EndTurn;
        let mut usage = TokenUsage::default();

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => {
                    debug!("stream: Event::Open");
                }
                Ok(Event::Message(msg)) => {
                    if msg.data.trim() == "[DONE]" {
                        debug!("stream: [DONE]");
                        break;
                    }

                    let chunk: OpenAIStreamChunk = match serde_json::from_str(&msg.data) {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            warn!(error = %e, "stream: malformed event");
                            es.close();
                            let _ = chunk_tx.send(StreamChunk::Error(e.to_string())).await;
                            return Err(LlmError::Json(e));
                        }
                    };

                    if let Some(error) = chunk.error {
                        warn!(message = %error.message, "stream: provider error event");
                        es.close();
                        let _ = chunk_tx.send(StreamChunk::Error(error.message.clone())).await;
                        return Err(LlmError::InvalidResponse(error.message));
                    }

                    if let Some(choice) = chunk.choices.first() {
                        if let Some(content) = &choice.delta.content {
                            full_content.push_str(content);
                            let _ = chunk_tx.send(StreamChunk::TextDelta(content.clone())).await;
                        }
                        if let Some(reason) = &choice.finish_reason {
                            stop_reason = StopReason::from_openai(reason);
                        }
                    }

                    // Usage arrives in the final chunk when include_usage is set
                    if let Some(u) = chunk.usage {
                        usage.input_tokens = u.prompt_tokens;
                        usage.output_tokens = u.completion_tokens;
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    debug!("stream: connection closed by server");
                    break;
                }
                Err(e) => {
                    es.close();
                    let err = LlmError::from_event_source(e, self.timeout).await;
                    warn!(error = %err, "stream: request failed");
                    let _ = chunk_tx.send(StreamChunk::Error(err.to_string())).await;
                    return Err(err);
                }
            }
        }
        es.close();

        debug!(content_len = full_content.len(), "stream: complete");
        let _ = chunk_tx.send(StreamChunk::MessageDone { stop_reason, usage }).await;

        Ok(CompletionResponse {
            content: full_content,
            stop_reason,
            usage,
        })
    }
}

// Streaming types

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    usage: Option<OpenAIUsage>,
    error: Option<OpenAIErrorBody>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::SamplingParams;
    use crate::llm::testing::{serve_once, sse};
    use crate::session::Turn;

    fn client(model: &str, base_url: &str) -> OpenAIClient {
        OpenAIClient::new(model, "test-key", base_url, None).unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new(
            vec![Turn::system("You are a coach"), Turn::assistant("Hi"), Turn::user("Hello")],
            SamplingParams::default(),
        )
    }

    async fn drain(mut rx: mpsc::Receiver<StreamChunk>) -> Vec<String> {
        let mut deltas = Vec::new();
        while let Some(chunk) = rx.recv().await {
            if let StreamChunk::TextDelta(text) = chunk {
                deltas.push(text);
            }
        }
        deltas
    }

    #[test]
    fn test_build_request_body_basic() {
        let client = client("gpt-4o", "https://api.openai.com");
        let body = client.build_request_body(&request());

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["stream"], true);
        assert_eq!(body["temperature"], 0.8);
        assert_eq!(body["presence_penalty"], 0.3);
        assert_eq!(body["frequency_penalty"], 0.3);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "You are a coach");
        assert_eq!(body["messages"][1]["role"], "assistant");
        assert_eq!(body["messages"][2]["role"], "user");
    }

    #[test]
    fn test_gpt5_uses_max_completion_tokens() {
        let client = client("gpt-5-mini", "https://api.openai.com");
        let body = client.build_request_body(&request());

        assert_eq!(body["max_completion_tokens"], 500);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = client("gpt-4o", "https://api.openai.com/");
        assert_eq!(client.base_url, "https://api.openai.com");
    }

    #[tokio::test]
    async fn test_stream_collects_deltas() {
        let payload = sse(&[
            r#"{"choices":[{"delta":{"role":"assistant"},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"content":"안녕"},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"content":"하세요"},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
            r#"{"choices":[],"usage":{"prompt_tokens":12,"completion_tokens":3}}"#,
            "[DONE]",
        ]);
        let (base_url, captured) = serve_once("200 OK", "text/event-stream", payload).await;
        let client = client("gpt-5-mini", &base_url);
        let (tx, rx) = mpsc::channel(100);

        let response = client.stream(request(), tx).await.unwrap();

        assert_eq!(response.content, "안녕하세요");
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(drain(rx).await, vec!["안녕", "하세요"]);

        let captured = captured.await.unwrap();
        assert!(captured.head.starts_with("POST /v1/chat/completions"));
        assert!(captured.head.to_lowercase().contains("authorization: bearer test-key"));
        assert_eq!(captured.body["stream"], true);
        assert_eq!(captured.body["messages"][0]["role"], "system");
    }

    #[tokio::test]
    async fn test_stream_rejected_request() {
        let (base_url, _captured) = serve_once(
            "401 Unauthorized",
            "application/json",
            r#"{"error":{"message":"Incorrect API key provided"}}"#.to_string(),
        )
        .await;
        let client = client("gpt-5-mini", &base_url);
        let (tx, _rx) = mpsc::channel(100);

        let err = client.stream(request(), tx).await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("Incorrect API key provided"));
    }

    #[tokio::test]
    async fn test_stream_malformed_event_fails_after_partial_text() {
        let payload = sse(&[r#"{"choices":[{"delta":{"content":"partial"},"finish_reason":null}]}"#, "{oops"]);
        let (base_url, _captured) = serve_once("200 OK", "text/event-stream", payload).await;
        let client = client("gpt-5-mini", &base_url);
        let (tx, rx) = mpsc::channel(100);

        let err = client.stream(request(), tx).await.unwrap_err();

        assert!(matches!(err, LlmError::Json(_)));
        assert_eq!(drain(rx).await, vec!["partial"]);
    }

    #[tokio::test]
    async fn test_stream_error_event() {
        let payload = sse(&[r#"{"error":{"message":"quota exceeded"}}"#]);
        let (base_url, _captured) = serve_once("200 OK", "text/event-stream", payload).await;
        let client = client("gpt-5-mini", &base_url);
        let (tx, _rx) = mpsc::channel(100);

        let err = client.stream(request(), tx).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid response: quota exceeded");
    }
}
