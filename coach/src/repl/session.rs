//! REPL session management

use chrono::Local;
use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info};

use crate::controller::SessionController;
use crate::prompts;
use crate::render::{ConsoleRenderer, TranscriptRenderer};
use crate::session::{Role, SessionStore};

/// Session store key for the line-mode surface
const REPL_CONTEXT: &str = "repl";

/// Characters of each turn shown by `/history`
const PREVIEW_CHARS: usize = 50;

/// Slash commands understood by the REPL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Reset,
    History,
    Quit,
    Unknown(String),
}

impl SlashCommand {
    /// Parse a line starting with `/`
    pub fn parse(input: &str) -> Self {
        let cmd = input.split_whitespace().next().unwrap_or("");
        match cmd {
            "/help" | "/h" => SlashCommand::Help,
            "/reset" | "/new" => SlashCommand::Reset,
            "/history" => SlashCommand::History,
            "/quit" | "/q" | "/exit" => SlashCommand::Quit,
            other => SlashCommand::Unknown(other.to_string()),
        }
    }
}

/// Interactive REPL session
pub struct ReplSession {
    store: SessionStore,
    controller: SessionController,
    renderer: ConsoleRenderer<std::io::Stdout>,
}

impl ReplSession {
    pub fn new(controller: SessionController) -> Self {
        Self {
            store: SessionStore::new(),
            controller,
            renderer: ConsoleRenderer::stdout(),
        }
    }

    /// Run the REPL main loop
    pub async fn run(&mut self, initial_message: Option<String>) -> Result<()> {
        self.print_welcome();
        let session = self.store.get_or_create_session(REPL_CONTEXT);
        info!(session = %session.id(), "REPL started");
        self.renderer.render(session.transcript());

        if let Some(message) = initial_message {
            self.process_user_input(&message).await;
        }

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let prompt = format!("{} {} ", Local::now().format("%H:%M").to_string().dimmed(), ">".bright_green());
            match rl.readline(&prompt) {
                Ok(line) => match classify(&line) {
                    LineAction::Skip => continue,
                    LineAction::Command(command) => {
                        let _ = rl.add_history_entry(line.trim());
                        if self.handle_slash_command(command) == SlashResult::Quit {
                            break;
                        }
                    }
                    LineAction::Message(message) => {
                        let _ = rl.add_history_entry(line.trim());
                        self.process_user_input(message).await;
                    }
                },
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C - just show new prompt
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        self.store.expire(REPL_CONTEXT);
        println!("{}", "💚 항상 당신 곁에".green());
        Ok(())
    }

    async fn process_user_input(&mut self, input: &str) {
        debug!(input_len = input.len(), "process_user_input: called");
        let session = self.store.get_or_create_session(REPL_CONTEXT);
        self.controller.submit(session, input, &mut self.renderer).await;
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "🌱 마음 코칭 선생님".bright_green().bold());
        println!("{}", "편하게 이야기해보세요".dimmed());
        println!("Type {} for help, {} to start over, {} to quit", "/help".yellow(), "/reset".yellow(), "/quit".yellow());
        println!();
    }

    fn handle_slash_command(&mut self, command: SlashCommand) -> SlashResult {
        debug!(?command, "handle_slash_command: called");
        match command {
            SlashCommand::Help => {
                self.print_help();
                SlashResult::Continue
            }
            SlashCommand::Reset => {
                println!("{}", "🔄 새로운 대화 시작".dimmed());
                let session = self.controller.reset(&mut self.store, REPL_CONTEXT, &mut self.renderer);
                println!("{}", format!("세션: {}...", session.id().short()).dimmed());
                SlashResult::Continue
            }
            SlashCommand::History => {
                self.print_history();
                SlashResult::Continue
            }
            SlashCommand::Quit => SlashResult::Quit,
            SlashCommand::Unknown(cmd) => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
                SlashResult::Continue
            }
        }
    }

    fn print_help(&self) {
        println!();
        println!("{}", "💡 이용 안내".bright_cyan());
        for line in prompts::help_text().lines() {
            println!("  • {}", line);
        }
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Start a new conversation", "/reset".yellow());
        println!("  {:14} Show conversation history", "/history".yellow());
        println!("  {:14} Exit", "/quit".yellow());
        println!();
    }

    fn print_history(&self) {
        let Some(session) = self.store.get(REPL_CONTEXT) else {
            println!("{}", "No conversation history.".dimmed());
            return;
        };

        println!();
        println!("{} {}", "Conversation History:".bright_cyan(), format!("(세션: {}...)", session.id().short()).dimmed());
        for (i, turn) in session.transcript().iter().enumerate() {
            let role = match turn.role {
                Role::User => "User".bright_green(),
                Role::Assistant => "Coach".bright_blue(),
                Role::System => continue,
            };
            println!("  {}. {}: {}", i + 1, role, preview(&turn.content));
        }
        println!();
    }
}

/// What a line read from the prompt asks for
#[derive(Debug, PartialEq, Eq)]
enum LineAction<'a> {
    Skip,
    Command(SlashCommand),
    /// Text to send, exactly as typed
    Message(&'a str),
}

/// Trimming only decides blank lines and commands; messages keep their whitespace
fn classify(line: &str) -> LineAction<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        LineAction::Skip
    } else if trimmed.starts_with('/') {
        LineAction::Command(SlashCommand::parse(trimmed))
    } else {
        LineAction::Message(line)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SlashResult {
    Continue,
    Quit,
}

/// First line of `text`, cut to PREVIEW_CHARS
fn preview(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("");
    let cut: String = first_line.chars().take(PREVIEW_CHARS).collect();
    if cut.len() < text.len() { format!("{}...", cut) } else { cut }
}
