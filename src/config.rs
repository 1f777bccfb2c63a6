//! Configuration file loading.
//!
//! A config file holds browser settings and one table per listing source.
//! Files are discovered with `prefer` and parsed with serde according to
//! their extension (TOML, YAML or JSON).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::scrapers::{BrowserEngineConfig, SourceConfig};

/// Errors reading a config file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {format} config {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Browser engine settings.
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    /// Listing sources by id.
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Falls back to an empty config when no file is found.
    pub async fn load() -> Result<Self, ConfigLoadError> {
        match prefer::load("event-scrape").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await,
                None => Ok(Self::default()),
            },
            Err(e) => {
                debug!("No config file discovered: {}", e);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file path.
    /// The format follows the file extension; JSON is the fallback.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigLoadError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigLoadError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |format: &'static str, message: String| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            format,
            message,
        };

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).map_err(|e| parse_err("TOML", e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| parse_err("YAML", e.to_string()))?
            }
            _ => serde_json::from_str(&contents).map_err(|e| parse_err("JSON", e.to_string()))?,
        };

        config.source_path = Some(path.to_path_buf());
        debug!("Loaded {} sources from {}", config.sources.len(), path.display());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Output file of a source, relative to the config file directory.
    pub fn output_path(&self, source: &SourceConfig) -> PathBuf {
        let base = self.base_dir().unwrap_or_else(|| PathBuf::from("."));
        self.resolve_path(&source.output.path, &base)
    }

    pub fn source(&self, id: &str) -> Option<&SourceConfig> {
        self.sources.get(id)
    }
}
