use std::path::{Path, PathBuf};

use serde_derive::Deserialize;

use crate::error::Result;
use crate::sql::parser::DEFAULT_SELECT_LIMIT;
use crate::storage::SnapshotKey;

/// Environment variables prefixed with this override file settings, e.g.
/// `VAULTDB_SNAPSHOT_PATH`.
pub const ENV_PREFIX: &str = "VAULTDB";

/// Database configuration
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Config {
    /// Snapshot file. Empty means an in-memory database that never persists.
    pub snapshot_path: String,
    /// Hex-encoded 32-byte snapshot key. Empty stores plaintext snapshots.
    pub encryption_key: String,
    pub compress: bool,
    pub query_log_capacity: usize,
    /// Row cap injected by optimize() into SELECTs without a LIMIT.
    pub select_limit: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_path: String::new(),
            encryption_key: String::new(),
            compress: true,
            query_log_capacity: 1000,
            select_limit: DEFAULT_SELECT_LIMIT,
            log_level: "info".into(),
        }
    }
}

impl Config {
    /// Loads configuration from defaults, an optional file, and the
    /// environment, in increasing order of precedence.
    pub fn load(file: Option<&str>) -> Result<Self> {
        let mut c = config::Config::builder()
            .set_default("snapshot_path", "")?
            .set_default("encryption_key", "")?
            .set_default("compress", true)?
            .set_default("query_log_capacity", 1000_i64)?
            .set_default("select_limit", DEFAULT_SELECT_LIMIT as i64)?
            .set_default("log_level", "info")?;
        if let Some(file) = file {
            c = c.add_source(config::File::with_name(file));
        }
        c = c.add_source(config::Environment::with_prefix(ENV_PREFIX));

        Ok(c.build()?.try_deserialize()?)
    }

    /// An in-memory configuration.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A configuration persisting to the given snapshot file.
    pub fn with_snapshot(path: impl AsRef<Path>) -> Self {
        Self { snapshot_path: path.as_ref().display().to_string(), ..Self::default() }
    }

    pub fn snapshot_path(&self) -> Option<PathBuf> {
        match self.snapshot_path.trim() {
            "" => None,
            path => Some(PathBuf::from(path)),
        }
    }

    /// Parses the configured encryption key, if any.
    pub fn key(&self) -> Result<Option<SnapshotKey>> {
        match self.encryption_key.trim() {
            "" => Ok(None),
            hex => Ok(Some(SnapshotKey::from_hex(hex)?)),
        }
    }
}
