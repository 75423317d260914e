//! LLM client module
//!
//! Provider clients stream chat completions over server-sent events; the
//! completion layer turns them into a fragment stream for the controller.

use std::sync::Arc;

use tracing::debug;

mod anthropic;
pub mod client;
mod completion;
mod error;
mod openai;
#[cfg(test)]
mod testing;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use completion::{CompletionClient, Fragment, FragmentStream};
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use types::{CompletionRequest, CompletionResponse, SamplingParams, StopReason, StreamChunk, TokenUsage};

use crate::config::LlmConfig;

/// Create an LLM client based on the provider specified in config
///
/// Supports "openai" and "anthropic" providers.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model(), "create_client: called");
    match config.provider.as_str() {
        "openai" => {
            debug!("create_client: creating OpenAI client");
            Ok(Arc::new(OpenAIClient::from_config(config)?))
        }
        "anthropic" => {
            debug!("create_client: creating Anthropic client");
            Ok(Arc::new(AnthropicClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::Config(format!(
                "Unknown LLM provider: '{}'. Supported: openai, anthropic",
                other
            )))
        }
    }
}
