//! Transcript rendering
//!
//! A renderer draws the stored transcript and the growing partial reply of
//! an in-flight cycle. Drawing failures are logged by the implementation and
//! never abort a cycle.

mod console;

pub use console::ConsoleRenderer;

use crate::session::{Role, Turn};

/// Trailing marker shown after partial text while a reply is streaming
pub const CURSOR_MARKER: &str = "▌";

pub const USER_AVATAR: &str = "🧑";
pub const ASSISTANT_AVATAR: &str = "🌱";

/// Display surface for a session transcript
pub trait TranscriptRenderer {
    /// Draw the stored turns in order; system turns are never shown
    fn render(&mut self, transcript: &[Turn]);

    /// Draw the in-progress reply
    ///
    /// While `done` is false the text is followed by `CURSOR_MARKER`.
    fn render_streaming(&mut self, partial: &str, done: bool);
}

/// Avatar for a visible role
pub fn avatar(role: Role) -> Option<&'static str> {
    match role {
        Role::User => Some(USER_AVATAR),
        Role::Assistant => Some(ASSISTANT_AVATAR),
        Role::System => None,
    }
}

/// Text of a partial reply as it should appear on screen
pub fn streaming_text(partial: &str, done: bool) -> String {
    if done {
        partial.to_string()
    } else {
        format!("{}{}", partial, CURSOR_MARKER)
    }
}
