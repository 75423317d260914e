//! Maeum - a warm counseling chat for students
//!
//! Each message a student sends is forwarded, together with the full
//! conversation and a fixed coaching instruction block, to a hosted
//! chat-completion endpoint. The reply streams back into the transcript as
//! it is generated. Coaching follows the GROW model
//! (Goal, Reality, Options, Will).
//!
//! Conversations live only in memory and disappear when the program exits.

pub mod cli;
pub mod config;
pub mod controller;
pub mod llm;
pub mod prompts;
pub mod render;
pub mod repl;
pub mod session;
pub mod tui;

pub use config::Config;
pub use controller::{CycleOutcome, CycleState, ResponseAssembler, SessionController};
pub use llm::{CompletionClient, Fragment, FragmentStream, LlmClient, LlmError};
pub use render::{ConsoleRenderer, TranscriptRenderer};
pub use session::{CoachingPhase, Role, Session, SessionId, SessionStore, Turn};
