//! TUI runner - main event loop
//!
//! Owns the terminal, the session store and the controller. A submitted
//! message runs its whole cycle inline, redrawing through `FrameRenderer`
//! on every fragment.

use std::fmt::Display;

use eyre::Result;
use ratatui::Terminal;
use ratatui::backend::Backend;
use tracing::{debug, info, warn};

use super::Tui;
use super::app::App;
use super::events::{Event, EventHandler};
use super::state::ChatState;
use super::views;
use crate::config::UiConfig;
use crate::controller::SessionController;
use crate::render::{TranscriptRenderer, streaming_text};
use crate::session::{Session, SessionStore, Turn};

/// Session store key for the full-screen surface
const TUI_CONTEXT: &str = "tui";

/// Renders controller output into the chat view, one full frame per call
pub struct FrameRenderer<'a, B: Backend> {
    terminal: &'a mut Terminal<B>,
    state: &'a mut ChatState,
}

impl<'a, B: Backend> FrameRenderer<'a, B> {
    pub fn new(terminal: &'a mut Terminal<B>, state: &'a mut ChatState) -> Self {
        Self { terminal, state }
    }

    fn draw(&mut self) {
        let state = &mut *self.state;
        if let Err(e) = self.terminal.draw(|frame| views::render(state, frame)) {
            warn_draw_failed(e);
        }
    }
}

fn warn_draw_failed(e: impl Display) {
    warn!(error = %e, "FrameRenderer: draw failed");
}

impl<B: Backend> TranscriptRenderer for FrameRenderer<'_, B> {
    fn render(&mut self, transcript: &[Turn]) {
        self.state.set_transcript(transcript);
        self.draw();
    }

    fn render_streaming(&mut self, partial: &str, done: bool) {
        self.state.set_streaming(streaming_text(partial, done));
        self.draw();
    }
}

/// TUI runner
pub struct TuiRunner {
    terminal: Tui,
    app: App,
    event_handler: EventHandler,
    store: SessionStore,
    controller: SessionController,
}

impl TuiRunner {
    pub fn new(terminal: Tui, controller: SessionController, ui: &UiConfig) -> Self {
        debug!(?ui, "TuiRunner::new: called");
        Self {
            terminal,
            app: App::new(ui.help_expanded),
            event_handler: EventHandler::new(ui.tick_rate()),
            store: SessionStore::new(),
            controller,
        }
    }

    /// Run the main loop until the user quits
    pub async fn run(&mut self) -> Result<()> {
        debug!("TuiRunner::run: called");
        let session = self.store.get_or_create_session(TUI_CONTEXT);
        info!(session = %session.id(), "Chat started");
        self.app.state_mut().sync_session(session);

        loop {
            self.terminal.draw(|frame| views::render(self.app.state_mut(), frame))?;

            match self.event_handler.next().await? {
                Event::Tick | Event::Resize(..) => {}
                Event::Key(key) => {
                    if self.app.handle_key(key) {
                        break;
                    }
                }
                Event::Mouse(mouse) => self.app.handle_mouse(mouse),
            }

            if self.app.state_mut().take_reset() {
                self.reset();
            }
            if let Some(input) = self.app.state_mut().take_submit() {
                self.submit(&input).await;
                if self.event_handler.discard_pending() {
                    debug!("TuiRunner::run: Ctrl+C pressed during reply");
                    break;
                }
            }

            if self.app.state().should_quit {
                debug!("TuiRunner::run: should_quit is true, breaking");
                break;
            }
        }

        self.store.expire(TUI_CONTEXT);
        debug!("TuiRunner::run: exiting");
        Ok(())
    }

    async fn submit(&mut self, input: &str) {
        debug!(input_len = input.len(), "TuiRunner::submit: called");
        let session = self.store.get_or_create_session(TUI_CONTEXT);
        let state = self.app.state_mut();
        state.busy = true;
        {
            let mut renderer = FrameRenderer::new(&mut self.terminal, state);
            self.controller.submit(session, input, &mut renderer).await;
        }
        self.app.state_mut().busy = false;
    }

    fn reset(&mut self) {
        debug!("TuiRunner::reset: called");
        let mut renderer = FrameRenderer::new(&mut self.terminal, self.app.state_mut());
        let session = self.controller.reset(&mut self.store, TUI_CONTEXT, &mut renderer);
        refresh_label(renderer.state, session);
    }
}

fn refresh_label(state: &mut ChatState, session: &Session) {
    state.session_label = session.id().short().to_string();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ratatui::backend::TestBackend;

    use crate::llm::client::mock::{MockLlmClient, Script};
    use crate::llm::{CompletionClient, SamplingParams};

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        terminal.backend().buffer().content().iter().map(|c| c.symbol()).collect()
    }

    #[tokio::test]
    async fn test_frame_renderer_draws_cycle() {
        let mock = Arc::new(MockLlmClient::new(vec![Script::reply(&["Deep ", "breaths help."])]));
        let mut controller = SessionController::new(CompletionClient::new(mock, SamplingParams::default()));
        let mut store = SessionStore::with_greeting("welcome");
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        let mut state = ChatState::new(false);

        let session = store.get_or_create_session(TUI_CONTEXT);
        state.sync_session(session);
        {
            let mut renderer = FrameRenderer::new(&mut terminal, &mut state);
            controller.submit(session, "exams", &mut renderer).await;
        }

        let text = screen(&terminal);
        assert!(text.contains("exams"));
        assert!(text.contains("Deep breaths help."));
        assert!(!text.contains("▌"));
        assert_eq!(state.transcript.len(), 3);
        assert!(state.streaming.is_none());
    }

    #[test]
    fn test_frame_renderer_streaming_marker() {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        let mut state = ChatState::new(false);
        {
            let mut renderer = FrameRenderer::new(&mut terminal, &mut state);
            renderer.render_streaming("typing", false);
        }

        assert_eq!(state.streaming.as_deref(), Some("typing▌"));
        assert!(screen(&terminal).contains("typing▌"));
    }

    #[test]
    fn test_reset_through_frame_renderer() {
        let mock = Arc::new(MockLlmClient::new(vec![]));
        let mut controller = SessionController::new(CompletionClient::new(mock, SamplingParams::default()));
        let mut store = SessionStore::with_greeting("welcome back");
        let old_id = store.get_or_create_session(TUI_CONTEXT).id().clone();
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        let mut state = ChatState::new(false);

        let mut renderer = FrameRenderer::new(&mut terminal, &mut state);
        let session = controller.reset(&mut store, TUI_CONTEXT, &mut renderer);
        let new_label = session.id().short().to_string();
        assert_ne!(session.id(), &old_id);
        refresh_label(renderer.state, session);

        assert_eq!(state.session_label, new_label);
        assert_eq!(state.transcript, vec![Turn::assistant("welcome back")]);
    }
}
