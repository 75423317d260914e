//! Line-mode chat
//!
//! A rustyline prompt over the same session controller the full-screen chat
//! uses, printing through the console renderer.

mod session;

pub use session::{ReplSession, SlashCommand};

use eyre::Result;
use tracing::debug;

use crate::config::Config;
use crate::controller::SessionController;
use crate::llm::CompletionClient;

/// Run the interactive REPL
///
/// This is the main entry point for `maeum repl`.
pub async fn run_interactive(config: &Config, initial_message: Option<String>) -> Result<()> {
    debug!(has_initial = initial_message.is_some(), "run_interactive: called");
    let completion = CompletionClient::from_config(&config.llm)
        .map_err(|e| eyre::eyre!("Failed to create LLM client: {}", e))?;

    let mut session = ReplSession::new(SessionController::new(completion));
    session.run(initial_message).await
}
