//! `[browser]` section of the config file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How Chrome is launched or reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Run without a window. Turn off to watch the listing being revealed.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Passed to Chrome as `--proxy-server`.
    #[serde(default)]
    pub proxy: Option<String>,

    /// Navigation and page-ready timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Chrome executable; searched for when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Extra command-line switches, appended after the defaults.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// DevTools endpoint of an already running Chrome ("ws://localhost:9222").
    /// When set nothing is launched.
    #[serde(default)]
    pub remote_url: Option<String>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            proxy: None,
            timeout: default_timeout(),
            chrome_path: None,
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}

pub fn default_headless() -> bool {
    true
}

pub fn default_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_table() {
        let config: BrowserEngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, BrowserEngineConfig::default());
        assert!(config.headless);
        assert_eq!(config.timeout, 30);
    }

    #[test]
    fn test_remote_and_args() {
        let config: BrowserEngineConfig = toml::from_str(
            r#"
            headless = false
            remote_url = "ws://localhost:9222"
            chrome_args = ["--lang=en-GB"]
            "#,
        )
        .unwrap();
        assert!(!config.headless);
        assert_eq!(config.remote_url.as_deref(), Some("ws://localhost:9222"));
        assert_eq!(config.chrome_args, vec!["--lang=en-GB"]);
    }
}
