//! CLI parse: clap types for Safeguard. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Safeguard - keeps protected directories and tables at their trusted state
#[derive(Debug, Parser)]
#[command(name = "safeguard")]
#[command(about = "Continuously restores protected directories and database tables")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    #[arg(long, default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Run every reconciler until interrupted (default)
    Run,
    /// Run one cycle of every reconciler and exit
    Once {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Load and validate the configuration
    Validate,
}

impl Cli {
    /// The subcommand to run; `run` when none was given
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }
}
