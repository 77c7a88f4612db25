//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "medisearch",
    version,
    author = "neur0map",
    about = "Hybrid keyword and vector search over medical reference documents",
    long_about = "Medisearch ranks reference documents for a question by fusing vector similarity, \
                  keyword overlap and domain heuristics, and caches results so repeated questions \
                  are answered instantly."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/medisearch/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rank corpus documents for a query using hybrid search
    Search {
        /// Search query text
        query: String,

        /// Corpus file (JSON array of documents)
        #[arg(long, value_name = "FILE")]
        corpus: PathBuf,

        /// Maximum number of results to return
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// BM25 keyword search only (no embedding model needed)
    Keyword {
        /// Search query text
        query: String,

        /// Corpus file (JSON array of documents)
        #[arg(long, value_name = "FILE")]
        corpus: PathBuf,

        /// Maximum number of results to return
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Interactive search session with result caching
    Shell {
        /// Corpus file (JSON array of documents)
        #[arg(long, value_name = "FILE")]
        corpus: PathBuf,

        /// Maximum number of results per query
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

/// Commands understood by the interactive shell besides plain queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Query(String),
    Stats,
    Clear,
    Reset,
    Quit,
    Empty,
    Unknown(String),
}

impl ShellCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "" => ShellCommand::Empty,
            ":stats" => ShellCommand::Stats,
            ":clear" => ShellCommand::Clear,
            ":reset" => ShellCommand::Reset,
            ":quit" | ":q" | ":exit" => ShellCommand::Quit,
            other if other.starts_with(':') => ShellCommand::Unknown(other.to_string()),
            query => ShellCommand::Query(query.to_string()),
        }
    }
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
