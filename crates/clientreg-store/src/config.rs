//! Connection settings for a [`Store`](crate::Store).

use std::path::PathBuf;

use serde::Deserialize;

/// Default SQLite busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5_000;

/// Settings used when a [`Store`](crate::Store) opens its connection.
///
/// Deserializes from the `[store]` table of a TOML config file; every
/// field is optional there.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file. `None` opens a private in-memory database, which is
    /// discarded when the store is closed.
    pub path: Option<PathBuf>,
    /// How long SQLite waits on a locked database before failing.
    pub busy_timeout_ms: u32,
    /// Whether embedding binaries should create the `users` table and its
    /// unique index before first use.
    pub create_schema: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            create_schema: true,
        }
    }
}

impl StoreConfig {
    /// Config for a database file at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Config for an in-memory database.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Whether this config targets an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }
}
