//! Outbound message assembly

use tracing::debug;

use super::embedded::instruction_block;
use crate::session::{Session, Turn};

/// Build the full message list for one completion call
///
/// The instruction block always leads as a system turn, followed by every
/// transcript turn (greeting included) in order. Rebuilt from scratch on each
/// call.
pub fn build_request(session: &Session) -> Vec<Turn> {
    debug!(
        session = %session.id().short(),
        turns = session.transcript().len(),
        "build_request: called"
    );
    let mut messages = Vec::with_capacity(session.transcript().len() + 1);
    messages.push(Turn::system(instruction_block()));
    messages.extend(session.transcript().iter().cloned());
    messages
}
