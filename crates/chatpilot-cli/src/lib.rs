// Library interface for chatpilot-cli
// This allows integration tests to access argument parsing and slash commands.

pub mod app;
pub mod cli;
pub mod commands;

pub use cli::{Cli, Command, ConfigAction};
pub use commands::{handle_command, CommandResult};
