use chatpilot_core::Settings;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "chatpilot")]
#[command(about = "Chatpilot - chat completions with conversation history")]
#[command(version)]
pub struct Cli {
    /// LLM model to use
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Sampling temperature
    #[arg(short, long, global = true)]
    pub temperature: Option<f32>,

    /// Override the API base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Send one prompt and print the answer (reads stdin when no prompt is given)
    Ask {
        prompt: Vec<String>,

        /// Stream the answer as it is generated
        #[arg(long, conflicts_with = "no_stream")]
        stream: bool,

        /// Wait for the full answer
        #[arg(long)]
        no_stream: bool,

        /// Do not resend conversation history
        #[arg(long)]
        no_context: bool,
    },
    /// Interactive chat (default)
    Chat,
    /// Show stored conversation history
    History {
        /// Number of most recent entries to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Clear stored conversation history
    Clear,
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the current settings
    Show,
    /// Print the settings file location
    Path,
    /// Set the default model
    Model { name: String },
    /// Set the history budget in characters (minimum 1000)
    MaxContext { chars: usize },
    /// Set the system prompt (blank restores the default)
    SystemPrompt { prompt: Vec<String> },
    /// Resend conversation history with each prompt
    Context {
        #[arg(action = clap::ArgAction::Set, value_parser = clap::builder::BoolishValueParser::new())]
        enabled: bool,
    },
    /// Stream answers by default
    Stream {
        #[arg(action = clap::ArgAction::Set, value_parser = clap::builder::BoolishValueParser::new())]
        enabled: bool,
    },
}

impl Cli {
    /// Apply per-invocation overrides on top of the loaded settings.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(ref model) = self.model {
            settings.llm.model = model.clone();
        }
        if let Some(temperature) = self.temperature {
            settings.llm.temperature = temperature;
        }
        if let Some(ref url) = self.base_url {
            settings.llm.base_url = Some(url.clone());
        }
    }
}

/// Decide whether an `ask` streams, given its flags and the configured default.
pub fn resolve_streaming(stream: bool, no_stream: bool, default: bool) -> bool {
    if stream {
        true
    } else if no_stream {
        false
    } else {
        default
    }
}
