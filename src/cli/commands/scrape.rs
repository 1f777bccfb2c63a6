//! Live scraping with Chromium.

use console::style;

use crate::cli::helpers::select_sources;
use crate::config::Config;

#[cfg(feature = "browser")]
use std::path::Path;

#[cfg(feature = "browser")]
use anyhow::Context;
#[cfg(feature = "browser")]
use tracing::debug;

#[cfg(feature = "browser")]
use crate::cli::helpers::spinner;
#[cfg(feature = "browser")]
use crate::scrapers::{BrowserSession, ListingPage, ListingScraper, RunSummary, SourceConfig};

/// Scrape the selected sources, one browser tab per source.
#[cfg(feature = "browser")]
pub async fn cmd_scrape(config: &Config, source_ids: &[String], all: bool) -> anyhow::Result<()> {
    let ids = select_sources(config, source_ids, all)?;
    let session = BrowserSession::start(config.browser.clone()).await?;

    let mut failed = Vec::new();
    for id in &ids {
        let Some(source) = config.source(id) else {
            continue;
        };
        let output = config.output_path(source);
        let pb = spinner(format!("Scraping {}...", source.name_or(id)));
        let result = scrape_source(&session, id, source, &output).await;
        pb.finish_and_clear();

        match result {
            Ok(summary) => println!("{} {}", style("✓").green(), summary),
            Err(e) => {
                eprintln!("{} {}: {:#}", style("✗").red(), id, e);
                failed.push(id.clone());
            }
        }
    }

    session.close().await;

    if !failed.is_empty() {
        anyhow::bail!(
            "{} of {} sources failed: {}",
            failed.len(),
            ids.len(),
            failed.join(", ")
        );
    }
    Ok(())
}

#[cfg(feature = "browser")]
async fn scrape_source(
    session: &BrowserSession,
    id: &str,
    source: &SourceConfig,
    output: &Path,
) -> anyhow::Result<RunSummary> {
    let scraper = ListingScraper::for_today(id, source.clone())?;
    let mut page = session.new_page().await?;

    let result = scraper.run(&mut page, output).await;
    if let Err(e) = page.close().await {
        debug!("Failed to close tab for {}: {}", id, e);
    }
    result.with_context(|| format!("Scrape of '{}' failed", id))
}

#[cfg(not(feature = "browser"))]
pub async fn cmd_scrape(config: &Config, source_ids: &[String], all: bool) -> anyhow::Result<()> {
    select_sources(config, source_ids, all)?;
    eprintln!(
        "{} Use 'replay' with saved HTML, or rebuild with browser support.",
        style("!").yellow()
    );
    anyhow::bail!("Browser support not compiled. Rebuild with: cargo build --features browser")
}
