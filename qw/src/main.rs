//! Questwright - guided quest and character generation
//!
//! CLI entry point for chatting with the engine and managing conversations.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};
use uuid::Uuid;

use questwright::cli::{Cli, Command, DumpFormat, ReplyFormat, get_log_path};
use questwright::config::Config;
use questwright::engine::Engine;
use questwright::repl::{ChatSession, print_response};
use questwright::schema::GoalRegistry;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(provider = %config.llm.provider, model = %config.llm.model, "Questwright loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Chat {
            conversation,
            profile,
            model,
        } => cmd_chat(&config, conversation, profile.as_deref(), model).await,
        Command::Send {
            message,
            conversation,
            profile,
            model,
            format,
        } => cmd_send(&config, &message, &conversation, profile.as_deref(), model, format).await,
        Command::Show { conversation, format } => cmd_show(&config, &conversation, format),
        Command::List => cmd_list(&config),
        Command::Delete { conversation } => cmd_delete(&config, &conversation),
        Command::Goals => cmd_goals(&config),
    }
}

fn read_profile(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path).context(format!("Failed to read profile {}", path.display())),
        None => Ok(String::new()),
    }
}

/// Interactive session over one conversation
async fn cmd_chat(config: &Config, conversation: Option<String>, profile: Option<&Path>, model: Option<String>) -> Result<()> {
    debug!(?conversation, ?profile, ?model, "cmd_chat: called");
    let engine = Engine::from_config(config)?;
    let profile = read_profile(profile)?;
    let conversation_id = conversation.unwrap_or_else(|| Uuid::now_v7().to_string());

    ChatSession::new(&engine, conversation_id, profile, model.unwrap_or_default())
        .run()
        .await
}

/// One message, one response
async fn cmd_send(
    config: &Config,
    message: &str,
    conversation: &str,
    profile: Option<&Path>,
    model: Option<String>,
    format: ReplyFormat,
) -> Result<()> {
    debug!(%conversation, %format, "cmd_send: called");
    let engine = Engine::from_config(config)?;
    let profile = read_profile(profile)?;

    let response = engine
        .process_message(conversation, message, &profile, &model.unwrap_or_default())
        .await;

    match format {
        ReplyFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        ReplyFormat::Text => print_response(&response),
    }

    if !response.is_success() {
        eyre::bail!("Message could not be processed");
    }
    Ok(())
}

/// Dump a stored conversation
fn cmd_show(config: &Config, conversation: &str, format: DumpFormat) -> Result<()> {
    debug!(%conversation, %format, "cmd_show: called");
    let engine = Engine::from_config(config)?;
    let state = engine
        .repository()
        .load(conversation)?
        .ok_or_else(|| eyre::eyre!("Conversation not found: {}", conversation))?;

    match format {
        DumpFormat::Yaml => print!("{}", serde_yaml::to_string(&state)?),
        DumpFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
    }
    Ok(())
}

fn cmd_list(config: &Config) -> Result<()> {
    debug!("cmd_list: called");
    let engine = Engine::from_config(config)?;
    let ids = engine.repository().list()?;
    if ids.is_empty() {
        println!("{}", "No conversations".dimmed());
        return Ok(());
    }

    for id in ids {
        match engine.repository().load(&id) {
            Ok(Some(state)) => println!(
                "{}  {:<12}  {:<16}  {}",
                id.cyan(),
                state.stage.name(),
                state.active_goal_id.as_deref().unwrap_or("-"),
                state.meta.updated_at.format("%Y-%m-%d %H:%M")
            ),
            Ok(None) => println!("{}", id.cyan()),
            Err(e) => println!("{}  {}", id.cyan(), format!("unreadable: {}", e).red()),
        }
    }
    Ok(())
}

fn cmd_delete(config: &Config, conversation: &str) -> Result<()> {
    debug!(%conversation, "cmd_delete: called");
    let engine = Engine::from_config(config)?;
    if engine.repository().delete(conversation)? {
        println!("Deleted {}", conversation);
    } else {
        println!("{} Conversation not found: {}", "?".yellow(), conversation);
    }
    Ok(())
}

fn cmd_goals(config: &Config) -> Result<()> {
    debug!("cmd_goals: called");
    let registry = config.load_goals()?;
    for id in registry.goal_ids() {
        let Some(goal) = registry.get_goal_schema(&id) else {
            continue;
        };
        println!("{}  {}", goal.id.bright_cyan().bold(), goal.description);
        for field in &goal.fields {
            let marker = if field.required { "*".red().to_string() } else { " ".to_string() };
            let options = field
                .options
                .as_ref()
                .map(|o| format!(" [{}]", o.join(", ")))
                .unwrap_or_default();
            println!("  {} {:<14} {:<6}{}", marker, field.name, field.field_type, options.dimmed());
        }
        println!();
    }
    Ok(())
}
