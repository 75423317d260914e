//! TUI application - key handling
//!
//! The App owns the ChatState and turns key presses into state changes and
//! pending requests for the runner. It does no rendering.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind};
use tracing::{debug, trace};

use super::state::{ChatState, PAGE_SCROLL};

/// Lines moved per mouse wheel notch
const WHEEL_SCROLL: usize = 3;

/// TUI application
#[derive(Debug)]
pub struct App {
    state: ChatState,
}

impl App {
    pub fn new(help_expanded: bool) -> Self {
        debug!("App::new: called");
        Self {
            state: ChatState::new(help_expanded),
        }
    }

    pub fn state(&self) -> &ChatState {
        trace!("App::state: called");
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ChatState {
        trace!("App::state_mut: called");
        &mut self.state
    }

    /// Handle a key event
    ///
    /// Returns true if the application should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        debug!(?key, "App::handle_key: called");
        if key.kind == KeyEventKind::Release {
            return false;
        }

        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                debug!("App::handle_key: Ctrl+C - quit");
                self.state.should_quit = true;
                return true;
            }
            (KeyCode::Char('r'), KeyModifiers::CONTROL) => {
                debug!("App::handle_key: Ctrl+R - reset requested");
                self.state.pending_reset = true;
            }
            (KeyCode::F(1), _) => {
                self.state.toggle_help();
            }
            (KeyCode::Up, _) => self.state.scroll_up(1),
            (KeyCode::Down, _) => self.state.scroll_down(1),
            (KeyCode::PageUp, _) => self.state.scroll_up(PAGE_SCROLL),
            (KeyCode::PageDown, _) => self.state.scroll_down(PAGE_SCROLL),
            (KeyCode::Home, _) => self.state.scroll_to_top(),
            (KeyCode::End, _) => self.state.scroll_to_bottom(),
            (KeyCode::Enter, _) => self.handle_submit(),
            (KeyCode::Esc, _) => {
                self.state.input.clear();
                self.state.cursor_pos = 0;
            }
            (KeyCode::Backspace, _) => {
                if self.state.cursor_pos > 0 {
                    let new_pos = self.prev_char_boundary(self.state.cursor_pos);
                    self.state.input.drain(new_pos..self.state.cursor_pos);
                    self.state.cursor_pos = new_pos;
                }
            }
            (KeyCode::Delete, _) => {
                if self.state.cursor_pos < self.state.input.len() {
                    let end_pos = self.next_char_boundary(self.state.cursor_pos);
                    self.state.input.drain(self.state.cursor_pos..end_pos);
                }
            }
            (KeyCode::Left, _) => {
                if self.state.cursor_pos > 0 {
                    self.state.cursor_pos = self.prev_char_boundary(self.state.cursor_pos);
                }
            }
            (KeyCode::Right, _) => {
                if self.state.cursor_pos < self.state.input.len() {
                    self.state.cursor_pos = self.next_char_boundary(self.state.cursor_pos);
                }
            }
            (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
                self.state.input.insert(self.state.cursor_pos, c);
                self.state.cursor_pos += c.len_utf8();
            }
            _ => {
                trace!("App::handle_key: unhandled key");
            }
        }

        false
    }

    /// Handle a mouse event (wheel scrolls the transcript)
    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.state.scroll_up(WHEEL_SCROLL),
            MouseEventKind::ScrollDown => self.state.scroll_down(WHEEL_SCROLL),
            _ => {}
        }
    }

    fn handle_submit(&mut self) {
        let input = std::mem::take(&mut self.state.input);
        self.state.cursor_pos = 0;
        if input.trim().is_empty() {
            debug!("App::handle_submit: blank input ignored");
            return;
        }
        debug!(input_len = input.len(), "App::handle_submit: queuing input");
        self.state.pending_submit = Some(input);
    }

    fn prev_char_boundary(&self, pos: usize) -> usize {
        let input = &self.state.input;
        let mut new_pos = pos.saturating_sub(1);
        while new_pos > 0 && !input.is_char_boundary(new_pos) {
            new_pos -= 1;
        }
        new_pos
    }

    fn next_char_boundary(&self, pos: usize) -> usize {
        let input = &self.state.input;
        let mut new_pos = pos + 1;
        while new_pos < input.len() && !input.is_char_boundary(new_pos) {
            new_pos += 1;
        }
        new_pos.min(input.len())
    }
}
