//! Anthropic Claude API client implementation
//!
//! Implements the LlmClient trait for Anthropic's Messages API. The
//! instruction block travels in the top-level `system` field; the
//! presence and frequency penalties have no counterpart and are not sent.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, StreamChunk, TokenUsage};
use crate::config::LlmConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude API client
pub struct AnthropicClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    timeout: Option<Duration>,
}

impl AnthropicClient {
    /// Create a new client from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(provider = %config.provider, model = %config.model(), "AnthropicClient::from_config: called");
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

    /// Build the request body for the Anthropic API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, message_count = %request.messages.len(), "build_request_body: called");
        let messages: Vec<serde_json::Value> = request
            .conversation()
            .map(|turn| {
                serde_json::json!({
                    "role": turn.role.as_str(),
                    "content": turn.content,
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.sampling.max_tokens,
            "temperature": request.sampling.temperature,
            "messages": messages,
            "stream": true,
        });

        if let Some(system) = request.system_prompt() {
            body["system"] = serde_json::json!(system);
        }

        body
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, "AnthropicClient::stream: called");
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request_body(&request);

        let http_request = self
            .http
            .post(url)
            .header("x-api-key", self.api_key.clone())
            .header("anthropic-version", ANTHROPIC_VERSION)
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
                    let data: serde_json::Value = match serde_json::from_str(&msg.data) {
                        Ok(data) => data,
                        Err(e) => {
                            warn!(error = %e, "stream: malformed event");
                            es.close();
                            let _ = chunk_tx.send(StreamChunk::Error(e.to_string())).await;
                            return Err(LlmError::Json(e));
                        }
                    };

                    match data["type"].as_str() {
                        Some("message_start") => {
                            debug!("stream: message_start");
                            if let Some(u) = data["message"].get("usage") {
                                usage.input_tokens = u["input_tokens"].as_u64().unwrap_or(0);
                                let _ = chunk_tx
                                    .send(StreamChunk::MessageStart {
                                        input_tokens: usage.input_tokens,
                                    })
                                    .await;
                            }
                        }
                        Some("content_block_delta") => {
                            if let Some(text) = data["delta"]["text"].as_str() {
                                full_content.push_str(text);
                                let _ = chunk_tx.send(StreamChunk::TextDelta(text.to_string())).await;
                            }
                        }
                        Some("message_delta") => {
                            debug!("stream: message_delta");
                            if let Some(sr) = data["delta"]["stop_reason"].as_str() {
                                stop_reason = StopReason::from_anthropic(sr);
                            }
                            if let Some(u) = data.get("usage") {
                                usage.output_tokens = u["output_tokens"].as_u64().unwrap_or(0);
                            }
                        }
                        Some("message_stop") => {
                            debug!("stream: message_stop");
                            break;
                        }
                        Some("error") => {
                            let message = data["error"]["message"].as_str().unwrap_or("unknown error").to_string();
                            warn!(%message, "stream: provider error event");
                            es.close();
                            let _ = chunk_tx.send(StreamChunk::Error(message.clone())).await;
                            return Err(LlmError::InvalidResponse(message));
                        }
                        _ => {
                            debug!("stream: ignored event type");
                        }
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
