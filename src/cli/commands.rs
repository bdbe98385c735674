//! CLI commands
//!
//! Words and slash commands the loop handles itself instead of sending them
//! to the supervisor.

/// What a line of input means to the loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `exit` or `quit`, any case
    Exit,
    Help,
    Status,
    /// Toggle the debug trace
    Debug,
    /// Start a new thread
    Reset,
    /// Show the thread id
    Thread,
    Unknown(String),
    /// Regular input for the supervisor
    Message(String),
}

/// Classify one trimmed line of input
pub fn parse_command(input: &str) -> Command {
    let input = input.trim();
    let lower = input.to_lowercase();

    if lower == "exit" || lower == "quit" {
        return Command::Exit;
    }
    if !input.starts_with('/') {
        return Command::Message(input.to_string());
    }

    let cmd = lower.split_whitespace().next().unwrap_or("");
    match cmd {
        "/exit" | "/quit" => Command::Exit,
        "/help" | "/?" => Command::Help,
        "/status" => Command::Status,
        "/debug" => Command::Debug,
        "/reset" | "/clear" => Command::Reset,
        "/thread" => Command::Thread,
        _ => Command::Unknown(cmd.to_string()),
    }
}

/// Generate help text
pub fn help_text() -> String {
    r#"EVANA Commands:
─────────────────────────────────────────────
  /help            Show this help message
  /status          Show backend, model and script progress
  /debug           Toggle the agent trace
  /reset           Start a new conversation thread
  /thread          Show the current thread id
  exit, quit       End the conversation

Keyboard Shortcuts:
  Ctrl+C           End the conversation
  Ctrl+D           End the conversation
─────────────────────────────────────────────"#
        .to_string()
}
