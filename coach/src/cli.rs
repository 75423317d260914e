//! CLI command definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

/// Maeum - counseling chat for students
#[derive(Parser)]
#[command(
    name = "maeum",
    about = "Warm GROW-model coaching chat for students, in the terminal",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Full-screen chat (default)
    Chat,

    /// Line-mode chat
    Repl {
        /// Send this message first, then continue interactively
        message: Option<String>,
    },
}

/// Path of the log file
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("maeum")
        .join("logs")
        .join("maeum.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Generate the after_help text with credential status and log location
pub fn generate_after_help(api_key_env: &str) -> String {
    debug!(%api_key_env, "generate_after_help: called");
    let key_set = std::env::var(api_key_env).map(|v| !v.trim().is_empty()).unwrap_or(false);
    let icon = if key_set { "\u{2705}" } else { "\u{274C}" };

    let mut help = String::new();
    help.push_str("Credentials:\n");
    help.push_str(&format!(
        "  {} {} {}\n",
        icon,
        api_key_env,
        if key_set { "set" } else { "not set" }
    ));
    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));
    help
}
