//! LLM request/response types
//!
//! Provider-agnostic: the OpenAI and Anthropic clients translate these into
//! their own wire formats.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::session::{Role, Turn};

/// Sampling parameters sent with every completion request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f64,
    pub max_tokens: u32,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_tokens: 500,
            presence_penalty: 0.3,
            frequency_penalty: 0.3,
        }
    }
}

/// A completion request - everything needed for one LLM call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Instruction block first, then the transcript in order
    pub messages: Vec<Turn>,

    pub sampling: SamplingParams,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Turn>, sampling: SamplingParams) -> Self {
        debug!(message_count = %messages.len(), "CompletionRequest::new: called");
        Self { messages, sampling }
    }

    /// Concatenated system turns, for providers that take the system prompt separately
    pub fn system_prompt(&self) -> Option<String> {
        let system: Vec<&str> = self
            .messages
            .iter()
            .filter(|t| t.role == Role::System)
            .map(|t| t.content.as_str())
            .collect();
        if system.is_empty() { None } else { Some(system.join("\n\n")) }
    }

    /// Every non-system turn, in order
    pub fn conversation(&self) -> impl Iterator<Item = &Turn> {
        self.messages.iter().filter(|t| t.role != Role::System)
    }
}

/// Response from a completion request
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    /// Full text of the reply
    pub content: String,

    /// Why the model stopped
    pub stop_reason: StopReason,

    pub usage: TokenUsage,
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopReason {
    #[default]
    EndTurn,
    MaxTokens,
    StopSequence,
}

impl StopReason {
    /// Parse from Anthropic API stop_reason string
    pub fn from_anthropic(s: &str) -> Self {
        debug!(%s, "StopReason::from_anthropic: called");
        match s {
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        }
    }

    /// Parse from OpenAI finish_reason string
    pub fn from_openai(s: &str) -> Self {
        debug!(%s, "StopReason::from_openai: called");
        match s {
            "length" => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        }
    }
}

/// Token usage reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Streaming chunk sent by a client while a reply is generated
#[derive(Debug, Clone)]
pub enum StreamChunk {
    /// Message started with input token count
    MessageStart { input_tokens: u64 },

    /// Text being generated
    TextDelta(String),

    /// Message complete with final stats
    MessageDone { stop_reason: StopReason, usage: TokenUsage },

    /// Error during streaming
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_defaults() {
        let sampling = SamplingParams::default();
        assert_eq!(sampling.temperature, 0.8);
        assert_eq!(sampling.max_tokens, 500);
        assert_eq!(sampling.presence_penalty, 0.3);
        assert_eq!(sampling.frequency_penalty, 0.3);
    }

    #[test]
    fn test_system_prompt_split() {
        let request = CompletionRequest::new(
            vec![Turn::system("rules"), Turn::assistant("hi"), Turn::user("hello")],
            SamplingParams::default(),
        );

        assert_eq!(request.system_prompt().as_deref(), Some("rules"));
        let roles: Vec<Role> = request.conversation().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User]);
    }

    #[test]
    fn test_no_system_prompt() {
        let request = CompletionRequest::new(vec![Turn::user("hello")], SamplingParams::default());
        assert!(request.system_prompt().is_none());
    }

    #[test]
    fn test_stop_reason_parsing() {
        assert_eq!(StopReason::from_anthropic("end_turn"), StopReason::EndTurn);
        assert_eq!(StopReason::from_anthropic("max_tokens"), StopReason::MaxTokens);
        assert_eq!(StopReason::from_anthropic("stop_sequence"), StopReason::StopSequence);
        assert_eq!(StopReason::from_anthropic("unknown"), StopReason::EndTurn);
        assert_eq!(StopReason::from_openai("stop"), StopReason::EndTurn);
        assert_eq!(StopReason::from_openai("length"), StopReason::MaxTokens);
    }
}
