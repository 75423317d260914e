//! TUI state
//!
//! Everything the views need to draw one frame. The runner copies the
//! session transcript in after every change; the state never owns the session.

use tracing::debug;

use crate::session::{Session, Turn};

/// Lines moved by PageUp/PageDown
pub const PAGE_SCROLL: usize = 10;

/// Full-screen chat state
#[derive(Debug, Default)]
pub struct ChatState {
    /// Text being typed
    pub input: String,

    /// Cursor byte offset into `input`
    pub cursor_pos: usize,

    /// Help panel open
    pub help_expanded: bool,

    /// Manual scroll offset; None follows the newest line
    pub scroll: Option<usize>,

    /// Largest valid scroll offset, updated on every draw
    pub max_scroll: usize,

    /// Short session identifier shown in the header
    pub session_label: String,

    /// Snapshot of the visible transcript
    pub transcript: Vec<Turn>,

    /// Partial reply (with cursor marker) while a cycle runs
    pub streaming: Option<String>,

    /// A cycle is in flight
    pub busy: bool,

    /// Input submitted and waiting for the runner
    pub pending_submit: Option<String>,

    /// Reset requested and waiting for the runner
    pub pending_reset: bool,

    pub should_quit: bool,
}

impl ChatState {
    pub fn new(help_expanded: bool) -> Self {
        debug!(help_expanded, "ChatState::new: called");
        Self {
            help_expanded,
            ..Self::default()
        }
    }

    /// Copy the session's identity and transcript in
    pub fn sync_session(&mut self, session: &Session) {
        debug!(session = %session.id().short(), "ChatState::sync_session: called");
        self.session_label = session.id().short().to_string();
        self.set_transcript(session.transcript());
    }

    /// Replace the transcript snapshot and follow the newest line
    pub fn set_transcript(&mut self, transcript: &[Turn]) {
        self.transcript = transcript.to_vec();
        self.streaming = None;
        self.scroll = None;
    }

    pub fn set_streaming(&mut self, text: String) {
        self.streaming = Some(text);
        self.scroll = None;
    }

    pub fn take_submit(&mut self) -> Option<String> {
        self.pending_submit.take()
    }

    pub fn take_reset(&mut self) -> bool {
        std::mem::take(&mut self.pending_reset)
    }

    pub fn toggle_help(&mut self) {
        self.help_expanded = !self.help_expanded;
        debug!(help_expanded = self.help_expanded, "ChatState::toggle_help");
    }

    pub fn scroll_up(&mut self, lines: usize) {
        let current = self.scroll.unwrap_or(self.max_scroll);
        self.scroll = Some(current.saturating_sub(lines));
    }

    pub fn scroll_down(&mut self, lines: usize) {
        let next = self.scroll.unwrap_or(self.max_scroll).saturating_add(lines);
        self.scroll = if next >= self.max_scroll { None } else { Some(next) };
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = Some(0);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = None;
    }

    /// Scroll offset to draw with, given the current content height
    pub fn effective_scroll(&self) -> usize {
        self.scroll.unwrap_or(self.max_scroll).min(self.max_scroll)
    }
}
