//! Configuration file handling
//!
//! Configuration is a small JSON document. Fields not known here (for example
//! account credentials used by other tools) are ignored.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IngestError, Result};

/// Default directory scanned for FIT files
pub const DEFAULT_DATA_PATH: &str = "data";

/// Default activity store file
pub const DEFAULT_STORE_PATH: &str = "activities.ndjson";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the FIT file tree
    pub data_path: PathBuf,
    /// NDJSON file receiving stored activities
    pub store_path: PathBuf,
    pub log_level: String,
    /// `pretty`, `compact` or `json`; chosen from the terminal when unset
    pub log_format: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: None,
        }
    }
}

impl Config {
    /// Load a configuration file and make sure the data directory exists
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("failed to open {}: {}", path.display(), e))
        })?;

        let config = Self::from_json(&content)?;
        config.ensure_data_dir()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| IngestError::Config(format!("failed to decode config: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Create the data directory if it does not exist yet
    pub fn ensure_data_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.data_path).map_err(|e| {
            IngestError::Config(format!(
                "failed to create data directory {}: {}",
                self.data_path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::from_json(r#"{ "data_path": "/tmp/fit" }"#).unwrap();
        assert_eq!(config.data_path, PathBuf::from("/tmp/fit"));
        assert_eq!(config.store_path, PathBuf::from(DEFAULT_STORE_PATH));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, None);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = r#"{
            "database_path": "garmin.db",
            "data_path": "fit",
            "garmin_username": "user",
            "garmin_password": "secret",
            "retain_files": true,
            "download_days": 30
        }"#;
        let config = Config::from_json(json).unwrap();
        assert_eq!(config.data_path, PathBuf::from("fit"));
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        match Config::from_json("not json") {
            Err(IngestError::Config(msg)) => assert!(msg.starts_with("failed to decode config")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("fit").join("activities");
        let config_path = dir.path().join("config.json");

        let config = Config {
            data_path: data_path.clone(),
            ..Config::default()
        };
        fs::write(&config_path, config.to_json().unwrap()).unwrap();

        let loaded = Config::load(&config_path).unwrap();
        assert_eq!(loaded, config);
        assert!(data_path.is_dir());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(dir.path().join("missing.json")),
            Err(IngestError::Config(_))
        ));
    }
}
