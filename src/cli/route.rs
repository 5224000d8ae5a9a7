//! CLI route: dispatches each command to the engine and formats the result.

use super::output::{format_outcomes_json, format_outcomes_text, format_stats, format_validation_errors};
use super::parse::{Cli, Commands};
use crate::config::{ConfigLoader, SafeguardConfig};
use crate::engine::build_scheduler;
use crate::logging::LoggingConfig;
use anyhow::{anyhow, bail, Context};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::signal;
use tracing::{error, info, warn};

/// Text to print and the process exit code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub exit_code: i32,
}

impl CommandOutput {
    fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exit_code: 0,
        }
    }
}

/// Exit code of `once` when at least one cycle failed
pub const CYCLE_FAILURE_EXIT_CODE: i32 = 2;

/// Loaded configuration plus where it came from
pub struct RunContext {
    config_path: PathBuf,
    config: SafeguardConfig,
    created: bool,
}

impl RunContext {
    /// Load the configuration for `cli`. `run` writes a default file first
    /// when none exists.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let (config, created) = match cli.command() {
            Commands::Run => ConfigLoader::load_or_init(&cli.config)?,
            _ => (ConfigLoader::load(&cli.config)?, false),
        };
        Ok(Self {
            config_path: cli.config.clone(),
            config,
            created,
        })
    }

    pub fn from_config(config_path: impl Into<PathBuf>, config: SafeguardConfig) -> Self {
        Self {
            config_path: config_path.into(),
            config,
            created: false,
        }
    }

    pub fn config(&self) -> &SafeguardConfig {
        &self.config
    }

    /// Logging settings with CLI flags applied over the file
    pub fn logging_config(&self, cli: &Cli) -> LoggingConfig {
        let mut config = self.config.logging.clone();
        if let Some(ref level) = cli.log_level {
            config.level = level.clone();
        }
        if let Some(ref format) = cli.log_format {
            config.format = format.clone();
        }
        if let Some(ref output) = cli.log_output {
            config.output = output.clone();
        }
        if let Some(ref file) = cli.log_file {
            config.file = file.clone();
        }
        config
    }

    /// Write the default configuration file
    pub fn init_config(path: &Path, force: bool) -> anyhow::Result<CommandOutput> {
        ConfigLoader::write_default(path, force)?;
        Ok(CommandOutput::success(format!(
            "Wrote default configuration to {}",
            path.display()
        )))
    }

    /// Execute `command`. `shutdown` resolves when a running daemon must stop.
    ///
    /// An `Err` is always an initialization failure.
    pub async fn execute<F>(self, command: &Commands, shutdown: F) -> anyhow::Result<CommandOutput>
    where
        F: Future<Output = ()>,
    {
        if self.created {
            info!(path = %self.config_path.display(), "Wrote default configuration");
        }
        match command {
            Commands::InitConfig { force } => Self::init_config(&self.config_path, *force),
            Commands::Validate => {
                self.validated()?;
                Ok(CommandOutput::success(self.describe()))
            }
            Commands::Once { format } => self.once(format).await,
            Commands::Run => self.run(shutdown).await,
        }
    }

    fn validated(&self) -> anyhow::Result<()> {
        self.config.validate().map_err(|errors| {
            anyhow!(format_validation_errors(&errors)).context(format!(
                "Invalid configuration in {}",
                self.config_path.display()
            ))
        })
    }

    fn describe(&self) -> String {
        let on_off = |enabled: bool| if enabled { "enabled" } else { "disabled" };
        format!(
            "Configuration {} is valid: {} mirror pair(s), prune {}, restore {}",
            self.config_path.display(),
            self.config.mirror.ready_pairs().count(),
            on_off(self.config.prune.enabled),
            on_off(self.config.restore.enabled),
        )
    }

    async fn once(self, format: &str) -> anyhow::Result<CommandOutput> {
        if format != "text" && format != "json" {
            bail!("Invalid output format: {} (must be 'text' or 'json')", format);
        }
        self.validated()?;
        let scheduler = build_scheduler(&self.config)
            .await
            .context("Failed to initialize reconcilers")?;

        let outcomes = scheduler.run_once().await;
        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        let text = if format == "json" {
            format_outcomes_json(&outcomes)?
        } else {
            format_outcomes_text(&outcomes)
        };
        Ok(CommandOutput {
            text,
            exit_code: if failed > 0 { CYCLE_FAILURE_EXIT_CODE } else { 0 },
        })
    }

    async fn run<F>(self, shutdown: F) -> anyhow::Result<CommandOutput>
    where
        F: Future<Output = ()>,
    {
        self.validated()?;
        let scheduler = build_scheduler(&self.config)
            .await
            .context("Failed to initialize reconcilers")?;
        if scheduler.is_empty() {
            warn!("No reconcilers enabled, nothing to do");
            return Ok(CommandOutput::success("No reconcilers enabled"));
        }

        let handle = scheduler.spawn();
        info!(reconcilers = handle.len(), "Safeguard running");
        shutdown.await;
        info!("Shutdown requested");
        let stats = handle.shutdown().await;
        info!("Safeguard stopped");
        Ok(CommandOutput::success(format_stats(&stats)))
    }
}

/// Resolves on Ctrl-C or, on unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
