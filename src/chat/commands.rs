//! Slash command parsing for the chat application.
//!
//! Lines starting with `/` control the client; everything else is a prompt
//! for the current session.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Create a session, optionally for a specific agent, and select it.
    New(Option<String>),

    /// List sessions.
    Sessions,

    /// Select a session by id or list position.
    Select(String),

    /// Delete a session by id or list position.
    Delete(String),

    /// List agents.
    Agents,

    /// Change the agent for new sessions.
    Agent(String),

    /// Reprint the current session's turns.
    History,

    /// Refetch the session list.
    Refresh,

    /// Log in, optionally with an explicit credential.
    Login(Option<String>),

    /// Log out.
    Logout,

    /// Show who is logged in.
    WhoAmI,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be sent as a prompt.
///
/// # Examples
///
/// ```
/// # use parley::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
/// assert_eq!(parse_command("/select 2"), Some(ChatCommand::Select("2".to_string())));
/// assert!(parse_command("What is the weather?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default().to_lowercase();
    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "new" => ChatCommand::New(argument.map(str::to_string)),
        "sessions" | "ls" => ChatCommand::Sessions,
        "select" | "open" => required(argument, "/select requires a session id or number")
            .map_or_else(ChatCommand::Invalid, ChatCommand::Select),
        "delete" | "rm" => required(argument, "/delete requires a session id or number")
            .map_or_else(ChatCommand::Invalid, ChatCommand::Delete),
        "agents" => ChatCommand::Agents,
        "agent" => required(argument, "/agent requires an agent name")
            .map_or_else(ChatCommand::Invalid, ChatCommand::Agent),
        "history" => ChatCommand::History,
        "refresh" => ChatCommand::Refresh,
        "login" => ChatCommand::Login(argument.map(str::to_string)),
        "logout" => ChatCommand::Logout,
        "whoami" => ChatCommand::WhoAmI,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

fn required(argument: Option<&str>, message: &str) -> Result<String, String> {
    argument
        .map(str::to_string)
        .ok_or_else(|| message.to_string())
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new [agent]           Start a new session (optionally for another agent)
  /sessions              List sessions, newest first
  /select <id|#>         Switch to a session and load its history
  /delete <id|#>         Delete a session (asks for confirmation)
  /agents                List available agents
  /agent <name>          Use this agent for new sessions
  /history               Reprint the current session
  /refresh               Refetch the session list
  /login [credential]    Log in (default: $PARLEY_CREDENTIAL)
  /logout                Log out and forget local state
  /whoami                Show the logged-in user
  /help                  Show this help message
  /quit                  Exit the chat
Anything else is sent to the current session.  Ctrl+C stops waiting for a reply."#
}
