//! Configuration System
//!
//! Settings come from a TOML file overlaid with `SAFEGUARD__SECTION__KEY`
//! environment variables. Every section has defaults, so an empty file is a
//! complete configuration. Validation collects every problem instead of
//! stopping at the first.

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use crate::store::{Ident, StoreTarget};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Prefix of environment overrides; nested keys are joined with `__`
pub const ENV_PREFIX: &str = "SAFEGUARD";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafeguardConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub mirror: MirrorConfig,

    #[serde(default)]
    pub prune: PruneConfig,

    #[serde(default)]
    pub restore: RestoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `host` or `host:port`
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_password")]
    pub password: String,

    #[serde(default = "default_database")]
    pub database: String,

    /// Full connection url (`mysql://...` or `sqlite:...`); takes precedence
    /// over the discrete fields when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn default_address() -> String {
    "127.0.0.1:3306".to_string()
}

fn default_username() -> String {
    "root".to_string()
}

fn default_password() -> String {
    "password".to_string()
}

fn default_database() -> String {
    "faka".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            username: default_username(),
            password: default_password(),
            database: default_database(),
            url: None,
        }
    }
}

impl StoreConfig {
    pub fn target(&self) -> StoreTarget {
        match &self.url {
            Some(url) => StoreTarget::Url(url.clone()),
            None => StoreTarget::MySql {
                address: self.address.clone(),
                username: self.username.clone(),
                password: self.password.clone(),
                database: self.database.clone(),
            },
        }
    }
}

/// Directory mirroring settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Audit file shared by every pair
    #[serde(default = "default_mirror_audit_log")]
    pub audit_log: PathBuf,

    #[serde(default = "default_pairs")]
    pub pairs: Vec<MirrorPair>,
}

fn default_interval_secs() -> u64 {
    5
}

fn default_mirror_audit_log() -> PathBuf {
    PathBuf::from("file_override.log")
}

fn default_pairs() -> Vec<MirrorPair> {
    ["pay", "plugin"]
        .into_iter()
        .map(|name| MirrorPair {
            name: name.to_string(),
            source: PathBuf::new(),
            target: PathBuf::new(),
        })
        .collect()
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            audit_log: default_mirror_audit_log(),
            pairs: default_pairs(),
        }
    }
}

impl MirrorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Pairs with both paths set
    pub fn ready_pairs(&self) -> impl Iterator<Item = &MirrorPair> {
        self.pairs
            .iter()
            .filter(|p| p.state() == PairState::Ready)
    }
}

/// A source directory and the directory that must mirror it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorPair {
    pub name: String,

    #[serde(default)]
    pub source: PathBuf,

    #[serde(default)]
    pub target: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    /// Both paths empty
    Disabled,
    /// Exactly one path set; skipped with a warning
    Incomplete,
    Ready,
}

impl MirrorPair {
    pub fn state(&self) -> PairState {
        match (
            self.source.as_os_str().is_empty(),
            self.target.as_os_str().is_empty(),
        ) {
            (true, true) => PairState::Disabled,
            (false, false) => PairState::Ready,
            _ => PairState::Incomplete,
        }
    }
}

/// Prune policy settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruneConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_prune_table")]
    pub table: String,

    #[serde(default = "default_key_column")]
    pub key_column: String,

    /// Key of the one row that survives every cycle
    #[serde(default = "default_sentinel_id")]
    pub sentinel_id: i64,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_prune_audit_log")]
    pub audit_log: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_prune_table() -> String {
    "acg_manage".to_string()
}

fn default_key_column() -> String {
    "id".to_string()
}

fn default_sentinel_id() -> i64 {
    1
}

fn default_prune_audit_log() -> PathBuf {
    PathBuf::from("acg_manage_cleanup.log")
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            table: default_prune_table(),
            key_column: default_key_column(),
            sentinel_id: default_sentinel_id(),
            interval_secs: default_interval_secs(),
            audit_log: default_prune_audit_log(),
        }
    }
}

impl PruneConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Restore policy settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_restore_table")]
    pub table: String,

    #[serde(default = "default_key_column")]
    pub key_column: String,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_restore_audit_log")]
    pub audit_log: PathBuf,
}

fn default_restore_table() -> String {
    "acg_pay".to_string()
}

fn default_restore_audit_log() -> PathBuf {
    PathBuf::from("acg_pay_protection.log")
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            table: default_restore_table(),
            key_column: default_key_column(),
            interval_secs: default_interval_secs(),
            audit_log: default_restore_audit_log(),
        }
    }
}

impl RestoreConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Store(String),
    Mirror(String, String),
    Prune(String),
    Restore(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Store(msg) => write!(f, "Store: {}", msg),
            ValidationError::Mirror(pair, msg) => write!(f, "Mirror pair '{}': {}", pair, msg),
            ValidationError::Prune(msg) => write!(f, "Prune: {}", msg),
            ValidationError::Restore(msg) => write!(f, "Restore: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

fn check_identifiers(table: &str, key_column: &str) -> Vec<String> {
    [("table", table), ("key_column", key_column)]
        .into_iter()
        .filter_map(|(field, value)| {
            Ident::new(value)
                .err()
                .map(|_| format!("{} {:?} is not a valid SQL identifier", field, value))
        })
        .collect()
}

/// Resolve symlinks and `..` when the path exists, so aliases compare equal.
fn normalized(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

impl SafeguardConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        match &self.store.url {
            Some(url) if !(url.starts_with("mysql:") || url.starts_with("sqlite:")) => {
                errors.push(ValidationError::Store(format!(
                    "url must start with mysql: or sqlite:, got {}",
                    crate::store::redact(url)
                )));
            }
            None if self.store.address.trim().is_empty() => {
                errors.push(ValidationError::Store("address cannot be empty".to_string()));
            }
            _ => {}
        }

        let mut names = HashSet::new();
        for pair in &self.mirror.pairs {
            if !names.insert(pair.name.as_str()) {
                errors.push(ValidationError::Mirror(
                    pair.name.clone(),
                    "duplicate pair name".to_string(),
                ));
            }
            if pair.state() != PairState::Ready {
                continue;
            }
            let source = normalized(&pair.source);
            let target = normalized(&pair.target);
            if source == target {
                errors.push(ValidationError::Mirror(
                    pair.name.clone(),
                    "source and target are the same directory".to_string(),
                ));
            } else if target.starts_with(&source) || source.starts_with(&target) {
                errors.push(ValidationError::Mirror(
                    pair.name.clone(),
                    "source and target must not contain each other".to_string(),
                ));
            }
        }
        if self.mirror.interval_secs == 0 && self.mirror.ready_pairs().next().is_some() {
            errors.push(ValidationError::Mirror(
                "*".to_string(),
                "interval_secs must be greater than zero".to_string(),
            ));
        }

        if self.prune.enabled {
            if self.prune.interval_secs == 0 {
                errors.push(ValidationError::Prune(
                    "interval_secs must be greater than zero".to_string(),
                ));
            }
            errors.extend(
                check_identifiers(&self.prune.table, &self.prune.key_column)
                    .into_iter()
                    .map(ValidationError::Prune),
            );
        }

        if self.restore.enabled {
            if self.restore.interval_secs == 0 {
                errors.push(ValidationError::Restore(
                    "interval_secs must be greater than zero".to_string(),
                ));
            }
            errors.extend(
                check_identifiers(&self.restore.table, &self.restore.key_column)
                    .into_iter()
                    .map(ValidationError::Restore),
            );
        }

        if self.prune.enabled && self.restore.enabled && self.prune.table == self.restore.table {
            errors.push(ValidationError::Restore(format!(
                "table {:?} is also pruned; the two policies would fight each other",
                self.restore.table
            )));
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Loads [`SafeguardConfig`] from file and environment
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `path` (missing file means all defaults) with environment overrides
    pub fn load(path: &Path) -> Result<SafeguardConfig, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load from file only, ignoring the environment
    pub fn load_from_file(path: &Path) -> Result<SafeguardConfig, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(true))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Write the default configuration to `path` first if it does not exist,
    /// then load it. Returns whether the file was created.
    pub fn load_or_init(path: &Path) -> Result<(SafeguardConfig, bool), ConfigError> {
        let created = if path.exists() {
            false
        } else {
            Self::write_default(path, false)?;
            true
        };
        Ok((Self::load(path)?, created))
    }

    /// Serialize the defaults to `path`. Refuses to overwrite unless `force`.
    pub fn write_default(path: &Path, force: bool) -> Result<(), ConfigError> {
        let write_err = |reason: String| ConfigError::Write {
            path: path.to_path_buf(),
            reason,
        };
        if path.exists() && !force {
            return Err(write_err("file already exists (use --force to overwrite)".to_string()));
        }
        let content = toml::to_string_pretty(&SafeguardConfig::default())
            .map_err(|e| write_err(e.to_string()))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
            }
        }
        std::fs::write(path, content).map_err(|e| write_err(e.to_string()))
    }
}
