//! Store configuration.
//!
//! Resolution order, lowest to highest priority:
//! 1. Defaults under the stocktake home directory
//! 2. `<home>/config.toml`
//! 3. `STOCKTAKE_USERS_FILE`, `STOCKTAKE_SCANS_FILE`, `STOCKTAKE_LOCK_TIMEOUT_MS`
//!
//! Command-line overrides are applied by the caller on the returned value.

use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const HOME_ENV: &str = "STOCKTAKE_HOME";
pub const USERS_FILE_ENV: &str = "STOCKTAKE_USERS_FILE";
pub const SCANS_FILE_ENV: &str = "STOCKTAKE_SCANS_FILE";
pub const LOCK_TIMEOUT_ENV: &str = "STOCKTAKE_LOCK_TIMEOUT_MS";

const DEFAULT_USERS_FILE: &str = "users.csv";
const DEFAULT_SCANS_FILE: &str = "scans.csv";
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Resolve the stocktake home directory.
///
/// Priority:
/// 1) STOCKTAKE_HOME
/// 2) ~/.stocktake
/// 3) ./.stocktake
pub fn stocktake_home() -> PathBuf {
    if let Ok(override_path) = std::env::var(HOME_ENV) {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .map(|home| home.join(".stocktake"))
        .unwrap_or_else(|| PathBuf::from(".").join(".stocktake"))
}

/// Logs directory: <home>/logs
pub fn logs_dir(home: &Path) -> PathBuf {
    home.join("logs")
}

/// Resolved locations and limits for the two stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub home: PathBuf,
    pub users_path: PathBuf,
    pub scans_path: PathBuf,
    /// Upper bound on waiting for the ledger write lock
    pub lock_timeout: Duration,
}

/// Optional overrides read from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub users_file: Option<PathBuf>,
    #[serde(default)]
    pub scans_file: Option<PathBuf>,
    #[serde(default)]
    pub lock_timeout_ms: Option<u64>,
}

impl FileConfig {
    /// Load `config.toml`; a missing file yields the empty config.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(StorageError::io(path, e)),
        };
        toml::from_str(&content)
            .map_err(|e| StorageError::Config(format!("{}: {}", path.display(), e)))
    }
}

impl StoreConfig {
    /// Defaults rooted at `home`, ignoring config file and environment.
    pub fn in_dir(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            users_path: home.join(DEFAULT_USERS_FILE),
            scans_path: home.join(DEFAULT_SCANS_FILE),
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            home,
        }
    }

    /// Full resolution from `home`: defaults, then config file, then environment.
    pub fn load(home: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let mut config = Self::in_dir(home);
        let file = FileConfig::load(&config.config_file_path())?;
        config.apply_file(&file);
        config.apply_env()?;
        debug!(
            users = %config.users_path.display(),
            scans = %config.scans_path.display(),
            "Resolved store config"
        );
        Ok(config)
    }

    /// Resolve from the default home directory.
    pub fn from_env() -> Result<Self, StorageError> {
        Self::load(stocktake_home())
    }

    pub fn config_file_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    fn apply_file(&mut self, file: &FileConfig) {
        if let Some(users) = &file.users_file {
            self.users_path = self.resolve(users);
        }
        if let Some(scans) = &file.scans_file {
            self.scans_path = self.resolve(scans);
        }
        if let Some(ms) = file.lock_timeout_ms {
            self.lock_timeout = Duration::from_millis(ms);
        }
    }

    fn apply_env(&mut self) -> Result<(), StorageError> {
        if let Ok(users) = std::env::var(USERS_FILE_ENV) {
            self.users_path = self.resolve(Path::new(&users));
        }
        if let Ok(scans) = std::env::var(SCANS_FILE_ENV) {
            self.scans_path = self.resolve(Path::new(&scans));
        }
        if let Ok(raw) = std::env::var(LOCK_TIMEOUT_ENV) {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                StorageError::Config(format!("{} must be milliseconds, got '{}'", LOCK_TIMEOUT_ENV, raw))
            })?;
            self.lock_timeout = Duration::from_millis(ms);
        }
        Ok(())
    }

    /// Relative paths are taken relative to the home directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.home.join(path)
        }
    }

    pub fn with_users_path(mut self, path: impl AsRef<Path>) -> Self {
        self.users_path = self.resolve(path.as_ref());
        self
    }

    pub fn with_scans_path(mut self, path: impl AsRef<Path>) -> Self {
        self.scans_path = self.resolve(path.as_ref());
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}
