//! Offline runs against saved HTML.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use console::style;

use crate::config::Config;
use crate::scrapers::{ListingScraper, SnapshotPage};

/// Parse `URL=FILE` pairs into a URL → HTML map.
fn load_details(specs: &[String]) -> anyhow::Result<HashMap<String, String>> {
    let mut details = HashMap::new();
    for spec in specs {
        // URLs may contain '=' in their query string; file names rarely do
        let (url, file) = spec
            .rsplit_once('=')
            .ok_or_else(|| anyhow::anyhow!("Invalid --detail '{}', expected URL=FILE", spec))?;
        let html = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read detail snapshot {}", file))?;
        details.insert(url.to_string(), html);
    }
    Ok(details)
}

/// Run a source's rules over saved snapshots and write its table.
pub async fn cmd_replay(
    config: &Config,
    source_id: &str,
    html: &[PathBuf],
    output: Option<PathBuf>,
    details: &[String],
) -> anyhow::Result<()> {
    let source = config
        .source(source_id)
        .ok_or_else(|| anyhow::anyhow!("Unknown source '{}'", source_id))?;

    let url = source.listing_url()?;
    let mut page = SnapshotPage::from_files(url, html)
        .context("Failed to read HTML snapshots")?
        .with_details(load_details(details)?);

    let output = output.unwrap_or_else(|| config.output_path(source));
    let scraper = ListingScraper::for_today(source_id, source.clone())?;
    let summary = scraper
        .run(&mut page, &output)
        .await
        .with_context(|| format!("Replay of '{}' failed", source_id))?;

    println!("{} {}", style("✓").green(), summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_details_splits_on_last_equals() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("detail.html");
        std::fs::write(&file, "<p>x</p>").unwrap();

        let spec = format!("https://example.com/e?id=7={}", file.display());
        let details = load_details(&[spec]).unwrap();
        assert_eq!(
            details.get("https://example.com/e?id=7").map(String::as_str),
            Some("<p>x</p>")
        );

        assert!(load_details(&["no-separator".to_string()]).is_err());
    }
}
