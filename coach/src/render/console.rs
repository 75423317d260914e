//! Line-oriented renderer for the REPL

use std::io::{self, Write};

use colored::Colorize;
use tracing::{debug, warn};

use super::{ASSISTANT_AVATAR, CURSOR_MARKER, TranscriptRenderer, USER_AVATAR};
use crate::session::{Role, Turn};

/// Prints new turns as they appear and streams partial replies in place
///
/// Only turns not yet printed are written on each `render`; a transcript that
/// shrank (after a reset) is printed again from the start.
pub struct ConsoleRenderer<W: Write> {
    out: W,
    shown: usize,
    printed: Option<String>,
    cursor: bool,
    streamed: Option<String>,
}

impl ConsoleRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            shown: 0,
            printed: None,
            cursor: false,
            streamed: None,
        }
    }

    /// Consume the renderer, returning the writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_turn(&mut self, turn: &Turn) -> io::Result<()> {
        match turn.role {
            Role::User => writeln!(self.out, "{} {}", USER_AVATAR, turn.content.cyan())?,
            Role::Assistant => writeln!(self.out, "{} {}", ASSISTANT_AVATAR, turn.content)?,
            Role::System => return Ok(()),
        }
        writeln!(self.out)
    }

    fn try_render(&mut self, transcript: &[Turn]) -> io::Result<()> {
        if transcript.len() < self.shown {
            debug!(shown = self.shown, len = transcript.len(), "try_render: transcript shrank, reprinting");
            writeln!(self.out, "{}", "── 새 대화 ──".dimmed())?;
            self.shown = 0;
            self.streamed = None;
        }

        for turn in &transcript[self.shown..] {
            let already_streamed = turn.is_assistant() && self.streamed.as_deref() == Some(turn.content.as_str());
            if already_streamed {
                self.streamed = None;
                continue;
            }
            self.write_turn(turn)?;
        }
        self.shown = transcript.len();
        self.out.flush()
    }

    fn try_render_streaming(&mut self, partial: &str, done: bool) -> io::Result<()> {
        if self.cursor {
            // Step back over the marker
            write!(self.out, "\x08 \x08")?;
            self.cursor = false;
        }

        let printed = match self.printed.take() {
            Some(printed) if partial.starts_with(printed.as_str()) => printed,
            Some(_) => {
                // Reply was replaced rather than extended
                writeln!(self.out)?;
                write!(self.out, "{} ", ASSISTANT_AVATAR)?;
                String::new()
            }
            None => {
                write!(self.out, "{} ", ASSISTANT_AVATAR)?;
                String::new()
            }
        };

        write!(self.out, "{}", &partial[printed.len()..])?;

        if done {
            writeln!(self.out)?;
            writeln!(self.out)?;
            self.streamed = Some(partial.to_string());
        } else {
            write!(self.out, "{}", CURSOR_MARKER)?;
            self.cursor = true;
            self.printed = Some(partial.to_string());
        }
        self.out.flush()
    }
}

impl<W: Write> TranscriptRenderer for ConsoleRenderer<W> {
    fn render(&mut self, transcript: &[Turn]) {
        if let Err(e) = self.try_render(transcript) {
            warn!(error = %e, "ConsoleRenderer::render: write failed");
        }
    }

    fn render_streaming(&mut self, partial: &str, done: bool) {
        if let Err(e) = self.try_render_streaming(partial, done) {
            warn!(error = %e, "ConsoleRenderer::render_streaming: write failed");
        }
    }
}
