//! In-memory session store
//!
//! Maps a context key (one per UI surface) to its Session. Sessions live only
//! as long as the process; nothing here touches disk.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::turn::Turn;
use crate::prompts;

/// Opaque session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Full identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for display
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// GROW coaching phase
///
/// Advisory label only. Nothing moves a session between phases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoachingPhase {
    #[default]
    Greeting,
    Goal,
    Reality,
    Options,
    Will,
}

impl CoachingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoachingPhase::Greeting => "greeting",
            CoachingPhase::Goal => "goal",
            CoachingPhase::Reality => "reality",
            CoachingPhase::Options => "options",
            CoachingPhase::Will => "will",
        }
    }
}

impl std::fmt::Display for CoachingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One browsing session: identifier, transcript and phase
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    transcript: Vec<Turn>,
    phase: CoachingPhase,
}

impl Session {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            transcript: Vec::new(),
            phase: CoachingPhase::default(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Turns in chronological order
    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn phase(&self) -> CoachingPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: CoachingPhase) {
        debug!(%phase, "Session::set_phase: called");
        self.phase = phase;
    }

    /// Append a turn at the end of the transcript
    pub fn append_turn(&mut self, turn: Turn) {
        debug!(session = %self.id.short(), role = %turn.role, "Session::append_turn: called");
        self.transcript.push(turn);
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }

    /// Number of user submissions recorded so far
    pub fn user_turns(&self) -> usize {
        self.transcript.iter().filter(|t| t.is_user()).count()
    }

    fn restart(&mut self, id: SessionId) {
        self.id = id;
        self.transcript.clear();
        self.phase = CoachingPhase::default();
    }
}

/// Owner of every live Session
#[derive(Debug)]
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    issued: HashSet<SessionId>,
    greeting: String,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_greeting(prompts::greeting())
    }

    /// Create a store that greets new sessions with `greeting`
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self {
            sessions: HashMap::new(),
            issued: HashSet::new(),
            greeting: greeting.into(),
        }
    }

    /// Look up the session for `context`, creating it on first use
    ///
    /// An empty transcript receives the greeting turn. No completion call is
    /// involved.
    pub fn get_or_create_session(&mut self, context: &str) -> &mut Session {
        debug!(%context, "SessionStore::get_or_create_session: called");
        let issued = &mut self.issued;
        let session = self.sessions.entry(context.to_string()).or_insert_with(|| {
            let id = issue_id(issued);
            info!(%context, session = %id, "Created session");
            Session::new(id)
        });

        if session.is_empty() {
            debug!(session = %session.id.short(), "get_or_create_session: injecting greeting");
            session.append_turn(Turn::assistant(self.greeting.clone()));
        }
        session
    }

    /// Clear the session for `context` and give it a never-issued identifier
    ///
    /// The transcript is left empty; the next `get_or_create_session` greets.
    pub fn reset(&mut self, context: &str) -> &mut Session {
        debug!(%context, "SessionStore::reset: called");
        let id = issue_id(&mut self.issued);
        let session = self
            .sessions
            .entry(context.to_string())
            .or_insert_with(|| Session::new(id.clone()));

        info!(%context, old = %session.id, new = %id, "Reset session");
        session.restart(id);
        session
    }

    /// Drop the session for `context`
    pub fn expire(&mut self, context: &str) -> Option<Session> {
        debug!(%context, "SessionStore::expire: called");
        let removed = self.sessions.remove(context);
        if let Some(ref session) = removed {
            info!(%context, session = %session.id, turns = session.transcript.len(), "Expired session");
        }
        removed
    }

    pub fn get(&self, context: &str) -> Option<&Session> {
        self.sessions.get(context)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Generate an identifier that `issued` has never seen
fn issue_id(issued: &mut HashSet<SessionId>) -> SessionId {
    loop {
        let id = SessionId::generate();
        if issued.insert(id.clone()) {
            return id;
        }
        debug!("issue_id: collision, generating again");
    }
}
