//! Session controller
//!
//! Drives one request cycle: record the user turn, compose the request,
//! stream the reply through the renderer, then record the assistant turn.

use futures::StreamExt;
use tracing::{debug, info};

use crate::llm::{CompletionClient, Fragment};
use crate::prompts;
use crate::render::TranscriptRenderer;
use crate::session::{Session, SessionStore, Turn};

/// Where the controller is within a request cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CycleState {
    #[default]
    Idle,
    UserTurnRecorded,
    Streaming,
    Finalized,
}

/// Result of one completed cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Text stored as the assistant turn
    pub reply: String,

    /// True when the reply is the apology
    pub failed: bool,

    /// Fragments received, apology included
    pub fragments: usize,
}

/// Concatenates fragments into the reply text
///
/// An apology replaces whatever text arrived before it.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    text: String,
    fragments: usize,
    failed: bool,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: Fragment) {
        self.fragments += 1;
        match fragment {
            Fragment::Text(text) => self.text.push_str(&text),
            Fragment::Apology(apology) => {
                debug!(discarded = self.text.len(), "ResponseAssembler::push: apology replaces partial text");
                self.text = apology;
                self.failed = true;
            }
        }
    }

    /// Text assembled so far
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn finish(self) -> CycleOutcome {
        CycleOutcome {
            reply: self.text,
            failed: self.failed,
            fragments: self.fragments,
        }
    }
}

/// Orchestrates request cycles for whichever session it is handed
pub struct SessionController {
    completion: CompletionClient,
    state: CycleState,
}

impl SessionController {
    pub fn new(completion: CompletionClient) -> Self {
        debug!("SessionController::new: called");
        Self {
            completion,
            state: CycleState::Idle,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    fn transition(&mut self, next: CycleState) {
        debug!(from = ?self.state, to = ?next, "SessionController::transition");
        self.state = next;
    }

    /// Run one request cycle for `input`
    ///
    /// Blank input does not start a cycle and returns `None`. Otherwise the
    /// cycle always completes with an assistant turn appended, even when the
    /// provider call fails.
    pub async fn submit(
        &mut self,
        session: &mut Session,
        input: &str,
        renderer: &mut dyn TranscriptRenderer,
    ) -> Option<CycleOutcome> {
        debug!(session = %session.id().short(), input_len = input.len(), "submit: called");
        if input.trim().is_empty() {
            debug!("submit: blank input ignored");
            return None;
        }

        session.append_turn(Turn::user(input));
        self.transition(CycleState::UserTurnRecorded);
        renderer.render(session.transcript());

        let messages = prompts::build_request(session);
        self.transition(CycleState::Streaming);

        let mut stream = self.completion.stream_completion(messages);
        let mut assembler = ResponseAssembler::new();
        while let Some(fragment) = stream.next().await {
            assembler.push(fragment);
            renderer.render_streaming(assembler.text(), false);
        }

        let outcome = assembler.finish();
        renderer.render_streaming(&outcome.reply, true);
        self.transition(CycleState::Finalized);

        session.append_turn(Turn::assistant(outcome.reply.clone()));
        renderer.render(session.transcript());
        self.transition(CycleState::Idle);

        info!(
            session = %session.id().short(),
            fragments = outcome.fragments,
            failed = outcome.failed,
            turns = session.transcript().len(),
            "Cycle complete"
        );
        Some(outcome)
    }

    /// Discard the session for `context` and start over with a greeting
    pub fn reset<'a>(
        &mut self,
        store: &'a mut SessionStore,
        context: &str,
        renderer: &mut dyn TranscriptRenderer,
    ) -> &'a mut Session {
        debug!(%context, "SessionController::reset: called");
        store.reset(context);
        let session = store.get_or_create_session(context);
        renderer.render(session.transcript());
        self.transition(CycleState::Idle);
        session
    }
}
