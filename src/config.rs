//! Configuration loading and management
//!
//! Handles parsing of `.floor.toml` configuration files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::display::Locale;

/// Name of the configuration file at the workspace root
pub const CONFIG_FILE: &str = ".floor.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Actor configuration
    #[serde(default)]
    pub actor: ActorConfig,

    /// Document store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Task lifecycle configuration
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Break scheduler configuration
    #[serde(default)]
    pub breaks: BreaksConfig,

    /// Archiver configuration
    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// Actor-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Default actor name when none specified
    #[serde(default = "default_actor")]
    pub default: String,

    /// Default role when none specified
    #[serde(default = "default_role")]
    pub default_role: String,
}

fn default_actor() -> String {
    "unknown".to_string()
}

fn default_role() -> String {
    "USER".to_string()
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            default: default_actor(),
            default_role: default_role(),
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file, relative to the workspace root
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// How long a writer waits for the store lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".floor").join("db.json")
}

fn default_lock_timeout_ms() -> u64 {
    crate::lock::DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Tasks configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Language used for quantity phrases and the legacy display text
    #[serde(default)]
    pub locale: Locale,

    /// Reason recorded when a task is reported missing without one
    #[serde(default = "default_missing_reason")]
    pub default_missing_reason: String,

    /// Maximum note length in characters
    #[serde(default = "default_note_max_len")]
    pub note_max_len: usize,

    /// Roles that may only finish tasks they hold in progress
    #[serde(default = "default_claim_required_roles")]
    pub claim_required_roles: Vec<String>,

    /// Reject new tasks whose part is not in the parts catalog
    #[serde(default = "default_true")]
    pub require_known_part: bool,
}

fn default_missing_reason() -> String {
    "Other".to_string()
}

fn default_note_max_len() -> usize {
    50
}

fn default_claim_required_roles() -> Vec<String> {
    vec!["USER".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            default_missing_reason: default_missing_reason(),
            note_max_len: default_note_max_len(),
            claim_required_roles: default_claim_required_roles(),
            require_known_part: true,
        }
    }
}

/// Break scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreaksConfig {
    /// Scheduler polling cadence
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// A break created within this window suppresses a new one
    #[serde(default = "default_duplicate_guard_secs")]
    pub duplicate_guard_secs: i64,
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_duplicate_guard_secs() -> i64 {
    60
}

impl Default for BreaksConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            duplicate_guard_secs: default_duplicate_guard_secs(),
        }
    }
}

/// Archiver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Closed tasks older than this are moved to the archive
    #[serde(default = "default_retention_hours")]
    pub retention_hours: i64,

    /// Documents moved per atomic batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Upper bound on closed tasks fetched per run
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
}

fn default_retention_hours() -> i64 {
    24
}

fn default_batch_size() -> usize {
    450
}

fn default_fetch_limit() -> usize {
    1000
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            retention_hours: default_retention_hours(),
            batch_size: default_batch_size(),
            fetch_limit: default_fetch_limit(),
        }
    }
}

/// Largest batch the archiver may commit at once.
pub const MAX_BATCH_SIZE: usize = 500;
/// One hundred years.
pub const MAX_RETENTION_HOURS: i64 = 24 * 365 * 100;
pub const MAX_DUPLICATE_GUARD_SECS: i64 = 24 * 60 * 60;

impl Config {
    /// Load configuration from a `.floor.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a workspace root, or return defaults
    pub fn load_from_root(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Absolute path of the database file for a workspace root
    pub fn store_path(&self, root: &Path) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            root.join(&self.store.path)
        }
    }

    fn validate(&self) -> Result<()> {
        if self.actor.default.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "actor.default cannot be empty".to_string(),
            ));
        }
        if self.actor.default_role.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "actor.default_role cannot be empty".to_string(),
            ));
        }
        if self.tasks.default_missing_reason.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "tasks.default_missing_reason cannot be empty".to_string(),
            ));
        }
        if self.tasks.note_max_len == 0 {
            return Err(Error::InvalidConfig(
                "tasks.note_max_len must be > 0".to_string(),
            ));
        }
        if self.breaks.poll_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "breaks.poll_interval_secs must be > 0".to_string(),
            ));
        }
        if !(0..=MAX_DUPLICATE_GUARD_SECS).contains(&self.breaks.duplicate_guard_secs) {
            return Err(Error::InvalidConfig(format!(
                "breaks.duplicate_guard_secs must be between 0 and {MAX_DUPLICATE_GUARD_SECS}"
            )));
        }
        if !(1..=MAX_RETENTION_HOURS).contains(&self.archive.retention_hours) {
            return Err(Error::InvalidConfig(format!(
                "archive.retention_hours must be between 1 and {MAX_RETENTION_HOURS}"
            )));
        }
        if self.archive.batch_size == 0 || self.archive.batch_size > MAX_BATCH_SIZE {
            return Err(Error::InvalidConfig(format!(
                "archive.batch_size must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }
        if self.archive.fetch_limit == 0 {
            return Err(Error::InvalidConfig(
                "archive.fetch_limit must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
