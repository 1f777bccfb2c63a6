//! Shared helper functions for CLI commands.

use std::path::PathBuf;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Config;

/// Truncate a string to a maximum number of characters.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// Load the config file given with `--config`, or discover one.
pub async fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from_path(&path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::load().await.context("Failed to load config"),
    }
}

/// Resolve the source ids a command should run on.
pub fn select_sources(config: &Config, ids: &[String], all: bool) -> anyhow::Result<Vec<String>> {
    if config.sources.is_empty() {
        anyhow::bail!("No sources configured. Pass a config file with --config.");
    }
    if all {
        return Ok(config.sources.keys().cloned().collect());
    }
    if ids.is_empty() {
        anyhow::bail!("Specify one or more source ids, or use --all");
    }
    for id in ids {
        if config.source(id).is_none() {
            anyhow::bail!(
                "Unknown source '{}'. Configured: {}",
                id,
                config.sources.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        }
    }
    Ok(ids.to_vec())
}

/// Spinner shown while a source is being scraped.
pub fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
