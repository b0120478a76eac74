use anyhow::{bail, Context, Result};
use chatpilot_core::{
    ChatSession, HistoryEntry, HistoryFile, HistoryStore, OpenAIClient, SessionOptions, Settings,
};
use std::io::{self, Read, Write};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::{resolve_streaming, Cli, Command, ConfigAction};
use crate::commands::{handle_command, CommandResult};

/// Shown instead of an answer that came back with no text.
pub const EMPTY_ANSWER: &str = "(empty response)";

pub async fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load();
    cli.apply_overrides(&mut settings);

    match cli.command.clone().unwrap_or(Command::Chat) {
        Command::Ask {
            prompt,
            stream,
            no_stream,
            no_context,
        } => {
            let prompt = if prompt.is_empty() {
                read_stdin_prompt()?
            } else {
                prompt.join(" ")
            };
            if prompt.trim().is_empty() {
                bail!("Empty prompt");
            }
            if no_context {
                settings.context.use_context = false;
            }
            let streaming = resolve_streaming(stream, no_stream, settings.llm.stream);
            run_single_prompt(&settings, &prompt, streaming).await
        }
        Command::Chat => run_interactive(&settings).await,
        Command::History { limit } => {
            let history = HistoryFile::new()?.load()?;
            print_history(history.entries(), limit);
            Ok(())
        }
        Command::Clear => {
            clear_history_file(&HistoryFile::new()?)?;
            println!("History cleared.");
            Ok(())
        }
        Command::Config { action } => run_config(action.unwrap_or(ConfigAction::Show)),
    }
}

fn open_session(settings: &Settings) -> Result<ChatSession<OpenAIClient>> {
    let options = SessionOptions::from_settings(settings)?;
    let client = settings.build_client()?;
    let file = HistoryFile::new()?;
    let session = ChatSession::new(client, options)
        .with_history(file.load_or_empty())
        .persist_to(file);
    Ok(session)
}

/// Overwrite the stored history with an empty one, whatever the file holds now.
pub fn clear_history_file(file: &HistoryFile) -> Result<()> {
    file.save(&HistoryStore::new())
        .with_context(|| format!("Failed to clear {}", file.path().display()))
}

// ── Single-prompt mode ──────────────────────────────────────────────────

pub async fn run_single_prompt(settings: &Settings, prompt: &str, streaming: bool) -> Result<()> {
    let mut session = open_session(settings)?;
    ask(&mut session, prompt, streaming).await
}

async fn ask(session: &mut ChatSession<OpenAIClient>, prompt: &str, streaming: bool) -> Result<()> {
    if streaming {
        let answer = session
            .ask_streaming(prompt, |delta| {
                print!("{delta}");
                let _ = io::stdout().flush();
            })
            .await?;
        if answer.is_empty() {
            print!("{EMPTY_ANSWER}");
        }
        println!();
    } else {
        let answer = session.ask(prompt).await?;
        println!("{}", display_answer(&answer));
    }
    Ok(())
}

pub fn display_answer(answer: &str) -> &str {
    if answer.is_empty() {
        EMPTY_ANSWER
    } else {
        answer
    }
}

fn read_stdin_prompt() -> Result<String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read prompt from stdin")?;
    Ok(buf)
}

// ── Interactive mode ────────────────────────────────────────────────────

async fn run_interactive(settings: &Settings) -> Result<()> {
    let mut session = open_session(settings)?;
    let mut streaming = settings.llm.stream;

    println!(
        "Chatpilot ({}) - type /help for commands, /quit to leave.",
        session.options().model
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match handle_command(line) {
            CommandResult::NotACommand => {
                if let Err(e) = ask(&mut session, line, streaming).await {
                    eprintln!("Error: {e}");
                }
            }
            CommandResult::Message(msg) => println!("{msg}"),
            CommandResult::Quit => break,
            CommandResult::Clear => {
                session.clear_history()?;
                println!("History cleared.");
            }
            CommandResult::ModelChanged(model) => {
                println!("Model set to {model}");
                session.options_mut().model = model;
            }
            CommandResult::SetStreaming(value) => {
                streaming = value.unwrap_or(!streaming);
                println!("Streaming {}", on_off(streaming));
            }
            CommandResult::SetContext(value) => {
                let options = session.options_mut();
                options.use_context = value.unwrap_or(!options.use_context);
                println!("Context {}", on_off(options.use_context));
            }
            CommandResult::ShowHistory(limit) => print_history(session.history().entries(), limit),
            CommandResult::ShowStatus => {
                let options = session.options();
                println!("model:      {}", options.model);
                println!("streaming:  {}", on_off(streaming));
                println!("context:    {}", on_off(options.use_context));
                println!("budget:     {} chars", options.max_context_chars);
                println!("history:    {} entries", session.history().len());
            }
        }
    }

    Ok(())
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

// ── History display ─────────────────────────────────────────────────────

pub fn format_entry(entry: &HistoryEntry) -> String {
    let when = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(entry.timestamp)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|| "-".to_string());
    format!("[{when}] {}: {}", entry.role, entry.text)
}

fn print_history(entries: &[HistoryEntry], limit: usize) {
    if entries.is_empty() {
        println!("No history yet.");
        return;
    }
    let start = entries.len().saturating_sub(limit);
    for entry in &entries[start..] {
        println!("{}", format_entry(entry));
    }
}

// ── Settings ────────────────────────────────────────────────────────────

fn run_config(action: ConfigAction) -> Result<()> {
    let mut settings = Settings::load();
    match action {
        ConfigAction::Show => {
            print!("{}", settings.to_toml()?);
            return Ok(());
        }
        ConfigAction::Path => {
            println!("{}", Settings::config_path().display());
            return Ok(());
        }
        ConfigAction::Model { name } => settings.llm.model = name,
        ConfigAction::MaxContext { chars } => settings.context.set_max_context_chars(chars),
        ConfigAction::SystemPrompt { prompt } => {
            settings.context.set_system_prompt(&prompt.join(" "))
        }
        ConfigAction::Context { enabled } => settings.context.use_context = enabled,
        ConfigAction::Stream { enabled } => settings.llm.stream = enabled,
    }
    settings.save()?;
    tracing::info!("Saved settings to {}", Settings::config_path().display());
    print!("{}", settings.to_toml()?);
    Ok(())
}
