//! Config file loading.
//!
//! Reads the `[store]` section from a TOML file (by default
//! `config/default.toml`). A missing file falls back to defaults; a file
//! that exists but does not parse is an error.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clientreg_store::StoreConfig;
use serde::Deserialize;
use tracing::debug;

/// Database file used when neither the config nor `--db` names one.
pub const DEFAULT_DB_PATH: &str = "data/clientreg.db";

/// Top-level layout of the config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    store: StoreConfig,
}

/// Load the store settings from `path`, then apply the `--db` override.
///
/// The returned config always names a database file.
pub fn load_store_config(path: &Path, db_override: Option<PathBuf>) -> Result<StoreConfig> {
    let mut config = match std::fs::read_to_string(path) {
        Ok(content) => parse(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, using defaults");
            StoreConfig::default()
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    if let Some(db) = db_override {
        config.path = Some(db);
    }
    if config.path.is_none() {
        config.path = Some(PathBuf::from(DEFAULT_DB_PATH));
    }
    Ok(config)
}

fn parse(content: &str) -> Result<StoreConfig> {
    let file: ConfigFile = toml::from_str(content)?;
    Ok(file.store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_default_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_store_config(&dir.path().join("absent.toml"), None).unwrap();
        assert_eq!(config.path, Some(PathBuf::from(DEFAULT_DB_PATH)));
        assert!(config.create_schema);
    }

    #[test]
    fn store_section_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.toml");
        std::fs::write(
            &path,
            "[store]\npath = \"/srv/clients.db\"\nbusy_timeout_ms = 250\ncreate_schema = false\n",
        )
        .unwrap();

        let config = load_store_config(&path, None).unwrap();
        assert_eq!(config.path, Some(PathBuf::from("/srv/clients.db")));
        assert_eq!(config.busy_timeout_ms, 250);
        assert!(!config.create_schema);
    }

    #[test]
    fn db_flag_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.toml");
        std::fs::write(&path, "[store]\npath = \"/srv/clients.db\"\n").unwrap();

        let config = load_store_config(&path, Some(PathBuf::from("/tmp/other.db"))).unwrap();
        assert_eq!(config.path, Some(PathBuf::from("/tmp/other.db")));
    }

    #[test]
    fn unrelated_sections_are_ignored() {
        let config = parse("[logging]\nlevel = \"info\"\n").unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.toml");
        std::fs::write(&path, "[store\npath = ").unwrap();
        assert!(load_store_config(&path, None).is_err());
    }
}
