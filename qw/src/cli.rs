//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// Questwright - guided quest and character generation
#[derive(Parser)]
#[command(
    name = "qw",
    about = "Guided conversations that collect what a generator needs, then generate",
    version
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
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive conversation
    Chat {
        /// Conversation to resume; a new one is started when omitted
        #[arg(long, value_parser = conversation_id)]
        conversation: Option<String>,

        /// File with the character profile passed to every prompt
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Model override for this session
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Send a single message and print the response
    Send {
        /// Message text
        message: String,

        /// Conversation id
        #[arg(long, required = true, value_parser = conversation_id)]
        conversation: String,

        /// File with the character profile
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Model override for this message
        #[arg(short, long)]
        model: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: ReplyFormat,
    },

    /// Print a stored conversation
    Show {
        /// Conversation id
        #[arg(value_parser = conversation_id)]
        conversation: String,

        /// Output format
        #[arg(short, long, default_value = "yaml")]
        format: DumpFormat,
    },

    /// List stored conversations
    List,

    /// Delete a stored conversation
    Delete {
        /// Conversation id
        #[arg(value_parser = conversation_id)]
        conversation: String,
    },

    /// List registered goals and their fields
    Goals,
}

/// Conversation ids double as file names in the session store
fn conversation_id(s: &str) -> Result<String, String> {
    sessionstore::validate_id(s).map_err(|e| e.to_string())?;
    Ok(s.to_string())
}

/// How `send` prints a response
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ReplyFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for ReplyFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "ReplyFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use text or json", s)),
        }
    }
}

impl std::fmt::Display for ReplyFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// How `show` prints a conversation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DumpFormat {
    #[default]
    Yaml,
    Json,
}

impl std::str::FromStr for DumpFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "DumpFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use yaml or json", s)),
        }
    }
}

impl std::fmt::Display for DumpFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yaml => write!(f, "yaml"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("questwright")
        .join("logs")
        .join("questwright.log")
}
