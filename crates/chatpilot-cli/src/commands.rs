/// Result of processing a slash command typed in interactive mode.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Display a message to the user.
    Message(String),
    /// Clear the persisted history.
    Clear,
    /// Quit the application.
    Quit,
    /// Change the model.
    ModelChanged(String),
    /// Turn streaming on, off, or flip it when no argument was given.
    SetStreaming(Option<bool>),
    /// Turn history resending on, off, or flip it.
    SetContext(Option<bool>),
    /// Show the last N history entries.
    ShowHistory(usize),
    /// Show model, flags and history size.
    ShowStatus,
    /// Not a command - treat as a prompt.
    NotACommand,
}

const DEFAULT_HISTORY_LIMIT: usize = 20;

pub fn handle_command(input: &str) -> CommandResult {
    let input = input.trim();
    if !input.starts_with('/') {
        return CommandResult::NotACommand;
    }

    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd {
        "/help" | "/h" => show_help(),
        "/exit" | "/quit" | "/q" => CommandResult::Quit,
        "/clear" => CommandResult::Clear,
        "/model" => {
            if arg.is_empty() {
                CommandResult::Message("Usage: /model <name>".to_string())
            } else {
                CommandResult::ModelChanged(arg.to_string())
            }
        }
        "/stream" => match parse_toggle(arg) {
            Ok(value) => CommandResult::SetStreaming(value),
            Err(msg) => CommandResult::Message(msg),
        },
        "/context" => match parse_toggle(arg) {
            Ok(value) => CommandResult::SetContext(value),
            Err(msg) => CommandResult::Message(msg),
        },
        "/history" => {
            if arg.is_empty() {
                CommandResult::ShowHistory(DEFAULT_HISTORY_LIMIT)
            } else {
                match arg.parse::<usize>() {
                    Ok(n) => CommandResult::ShowHistory(n),
                    Err(_) => CommandResult::Message(format!("Not a number: {arg}")),
                }
            }
        }
        "/status" => CommandResult::ShowStatus,
        _ => CommandResult::Message(format!(
            "Unknown command: {cmd}. Type /help for available commands."
        )),
    }
}

fn parse_toggle(arg: &str) -> Result<Option<bool>, String> {
    match arg.to_lowercase().as_str() {
        "" => Ok(None),
        "on" | "true" | "yes" => Ok(Some(true)),
        "off" | "false" | "no" => Ok(Some(false)),
        other => Err(format!("Expected on or off, got: {other}")),
    }
}

fn show_help() -> CommandResult {
    let help_text = "\
Chatpilot commands

  /help, /h              Show this help
  /model <name>          Change model for this session
  /stream [on|off]       Toggle streamed answers
  /context [on|off]      Toggle resending conversation history
  /history [n]           Show the last n history entries (default 20)
  /clear                 Clear the conversation history
  /status                Show model, flags and history size
  /quit, /exit, /q       Leave

Anything else is sent as a prompt.";
    CommandResult::Message(help_text.to_string())
}
