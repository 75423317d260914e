//! Session state: turns, transcript and the per-context store

mod store;
mod turn;

pub use store::{CoachingPhase, Session, SessionId, SessionStore};
pub use turn::{Role, Turn};
