//! Integration tests for full conversation cycles
//!
//! A scripted provider stands in for the completion endpoint; everything
//! else is the real store, composer, controller and console renderer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use maeum_coach::llm::{CompletionRequest, CompletionResponse, SamplingParams, StopReason, StreamChunk, TokenUsage};
use maeum_coach::prompts;
use maeum_coach::{
    CompletionClient, ConsoleRenderer, CycleState, LlmClient, LlmError, Role, SessionController, SessionStore, Turn,
};

// =============================================================================
// Scripted provider
// =============================================================================

enum Reply {
    Text(Vec<&'static str>),
    Status(u16, &'static str),
}

struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<CompletionRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedProvider {
    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        self.seen.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(deltas)) => {
                let mut content = String::new();
                for delta in deltas {
                    content.push_str(delta);
                    let _ = chunk_tx.send(StreamChunk::TextDelta(delta.to_string())).await;
                }
                Ok(CompletionResponse {
                    content,
                    stop_reason: StopReason::EndTurn,
                    usage: TokenUsage::default(),
                })
            }
            Some(Reply::Status(status, message)) => Err(LlmError::ApiError {
                status,
                message: message.to_string(),
            }),
            None => Err(LlmError::InvalidResponse("script exhausted".to_string())),
        }
    }
}

fn controller(provider: Arc<ScriptedProvider>) -> SessionController {
    SessionController::new(CompletionClient::new(provider, SamplingParams::default()))
}

// =============================================================================
// Conversation flow
// =============================================================================

#[tokio::test]
async fn test_multi_turn_conversation() {
    let provider = ScriptedProvider::new(vec![
        Reply::Text(vec!["시험 때문에 ", "많이 힘들구나."]),
        Reply::Text(vec!["어떤 과목이 ", "제일 걱정돼?"]),
    ]);
    let mut controller = controller(provider.clone());
    let mut store = SessionStore::new();
    let mut renderer = ConsoleRenderer::new(Vec::new());

    let session = store.get_or_create_session("integration");
    controller.submit(session, "시험이 너무 걱정돼요", &mut renderer).await;
    controller.submit(session, "수학이요", &mut renderer).await;

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 5);
    assert_eq!(transcript[0], Turn::assistant(prompts::greeting()));
    assert_eq!(transcript[2], Turn::assistant("시험 때문에 많이 힘들구나."));
    assert_eq!(transcript[4], Turn::assistant("어떤 과목이 제일 걱정돼?"));
    assert_eq!(controller.state(), CycleState::Idle);

    let seen = provider.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].messages.len(), 5);
    assert_eq!(seen[1].messages[0].role, Role::System);
    assert_eq!(&seen[1].messages[1..], &transcript[..4]);
    assert_eq!(seen[1].sampling.max_tokens, 500);

    let out = String::from_utf8(renderer.into_inner()).unwrap();
    assert_eq!(out.matches("제일 걱정돼?").count(), 1);
}

#[tokio::test]
async fn test_rejected_request_becomes_apology() {
    let provider = ScriptedProvider::new(vec![Reply::Status(401, "invalid api key"), Reply::Text(vec!["괜찮아"])]);
    let mut controller = controller(provider);
    let mut store = SessionStore::new();
    let mut renderer = ConsoleRenderer::new(Vec::new());

    let session = store.get_or_create_session("integration");
    let outcome = controller.submit(session, "hello", &mut renderer).await.unwrap();

    assert!(outcome.failed);
    assert_eq!(outcome.reply, prompts::apology("API error 401: invalid api key"));

    let outcome = controller.submit(session, "again", &mut renderer).await.unwrap();
    assert!(!outcome.failed);
    assert_eq!(session.transcript().len(), 5);
}

#[tokio::test]
async fn test_reset_mid_conversation() {
    let provider = ScriptedProvider::new(vec![Reply::Text(vec!["응"]), Reply::Text(vec!["새로 시작해"])]);
    let mut controller = controller(provider.clone());
    let mut store = SessionStore::new();
    let mut renderer = ConsoleRenderer::new(Vec::new());

    let session = store.get_or_create_session("integration");
    controller.submit(session, "first", &mut renderer).await;
    let first_id = session.id().clone();

    let session = controller.reset(&mut store, "integration", &mut renderer);
    assert_ne!(session.id(), &first_id);
    assert_eq!(session.transcript().len(), 1);

    controller.submit(session, "second", &mut renderer).await;
    let seen = provider.seen();
    // Nothing from before the reset is sent
    assert!(seen[1].messages.iter().all(|t| t.content != "first"));
    assert_eq!(seen[1].messages.len(), 3);
}

#[tokio::test]
async fn test_blank_submission_sends_nothing() {
    let provider = ScriptedProvider::new(vec![]);
    let mut controller = controller(provider.clone());
    let mut store = SessionStore::new();
    let mut renderer = ConsoleRenderer::new(Vec::new());

    let session = store.get_or_create_session("integration");
    assert!(controller.submit(session, "  ", &mut renderer).await.is_none());

    assert!(provider.seen().is_empty());
    assert_eq!(session.transcript().len(), 1);
}
