//! The listing scraper: reveal, extract, collect, write.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use super::config::{ConfigError, SourceConfig};
use super::extract::RecordExtractor;
use super::page::{ListingPage, PageError};
use super::reveal::Reveal;
use crate::services::date_normalize::DateNormalizer;
use crate::storage::{RecordSink, SinkError, Table};

/// Errors that abort a scrape run.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid source configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to load listing: {0}")]
    Page(#[from] PageError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub source: String,
    pub records_written: usize,
    pub cards_skipped: usize,
    pub batches: usize,
    pub field_failures: usize,
    pub output: Option<PathBuf>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} records ({} cards skipped, {} batches, {} field failures)",
            self.source, self.records_written, self.cards_skipped, self.batches, self.field_failures
        )?;
        if let Some(path) = &self.output {
            write!(f, " -> {}", path.display())?;
        }
        Ok(())
    }
}

/// Records collected from one listing, not yet written.
#[derive(Debug)]
pub struct RunOutcome {
    pub table: Table,
    pub summary: RunSummary,
}

/// Scraper for one configured listing source.
pub struct ListingScraper {
    id: String,
    source: SourceConfig,
    normalizer: DateNormalizer,
}

impl ListingScraper {
    /// Create a scraper, validating the source first.
    pub fn new(
        id: impl Into<String>,
        source: SourceConfig,
        normalizer: DateNormalizer,
    ) -> Result<Self, ScrapeError> {
        source.validate()?;
        Ok(Self {
            id: id.into(),
            source,
            normalizer,
        })
    }

    /// Scraper whose dates are anchored on today.
    pub fn for_today(id: impl Into<String>, source: SourceConfig) -> Result<Self, ScrapeError> {
        let normalizer = DateNormalizer::for_today(source.date_order);
        Self::new(id, source, normalizer)
    }

    /// Load the listing and extract every revealed card.
    pub async fn collect<P: ListingPage>(&self, page: &mut P) -> Result<RunOutcome, ScrapeError> {
        let url = self.source.listing_url()?;
        info!(source = %self.id, url = %url, "Loading listing");
        page.navigate(&url).await?;
        page.wait_for_network_idle().await?;
        tokio::time::sleep(Duration::from_millis(self.source.initial_settle_ms)).await;

        let page: &P = page;
        let mut extractor = RecordExtractor::new(&self.source, self.normalizer)?;
        let mut sink = RecordSink::new(self.source.columns());
        let mut reveal = Reveal::from_config(&self.source.reveal);

        let mut batches = 0;
        let mut skipped = 0;
        let mut index = 0;
        while let Some(batch) = reveal.next_batch(page, &self.source.card_selector).await {
            batches += 1;
            debug!(source = %self.id, batch = batches, cards = batch.len(), "Extracting batch");
            for card in &batch {
                match extractor.extract(page, card, index).await {
                    Some(record) => sink.append(record)?,
                    None => skipped += 1,
                }
                index += 1;
            }
        }

        let summary = RunSummary {
            source: self.id.clone(),
            records_written: sink.len(),
            cards_skipped: skipped,
            batches,
            field_failures: extractor.field_failures(),
            output: None,
        };
        info!(
            source = %self.id,
            records = summary.records_written,
            skipped = summary.cards_skipped,
            batches = summary.batches,
            field_failures = summary.field_failures,
            "Extraction complete"
        );

        Ok(RunOutcome {
            table: sink.flush(),
            summary,
        })
    }

    /// Collect the listing and write the table to `output`.
    pub async fn run<P: ListingPage>(
        &self,
        page: &mut P,
        output: &Path,
    ) -> Result<RunSummary, ScrapeError> {
        let RunOutcome { table, mut summary } = self.collect(page).await?;
        table.write_to_path(output, self.source.output.delimiter)?;
        summary.output = Some(output.to_path_buf());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::config::{FieldKind, FieldSpec, OutputConfig, RevealConfig};
    use crate::scrapers::snapshot::SnapshotPage;
    use crate::services::date_normalize::DayOrder;
    use chrono::NaiveDate;

    fn source(reveal: RevealConfig) -> SourceConfig {
        SourceConfig {
            name: None,
            base_url: "https://example.com".to_string(),
            listing_path: Some("/events".to_string()),
            card_selector: "div.card".to_string(),
            title_field: "Title".to_string(),
            fields: vec![
                FieldSpec::text("Title", "h3"),
                FieldSpec::text("Date", "span").with_kind(FieldKind::Date),
            ],
            date_order: DayOrder::DayFirst,
            reveal,
            initial_settle_ms: 0,
            output: OutputConfig {
                path: "out.csv".to_string(),
                delimiter: ',',
            },
        }
    }

    fn scraper(reveal: RevealConfig) -> ListingScraper {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        ListingScraper::new(
            "test",
            source(reveal),
            DateNormalizer::new(2024, today, DayOrder::DayFirst),
        )
        .unwrap()
    }

    fn page_html(titles: &[&str], next: bool) -> String {
        let cards: String = titles
            .iter()
            .map(|t| format!("<div class=\"card\"><h3>{}</h3><span>FEB 2 - 6</span></div>", t))
            .collect();
        let next = if next { "<a class=\"next\">Next</a>" } else { "" };
        format!("<html><body>{}{}</body></html>", cards, next)
    }

    #[tokio::test]
    async fn test_collect_navigates_to_listing() {
        let mut page = SnapshotPage::new("about:blank", vec![page_html(&["A", "B"], false)]);
        let outcome = scraper(RevealConfig::Scroll {
            max_steps: 3,
            pause_ms: 0,
            interleave: false,
        })
        .collect(&mut page)
        .await
        .unwrap();

        assert_eq!(page.url(), "https://example.com/events");
        assert_eq!(outcome.summary.records_written, 2);
        assert_eq!(outcome.summary.batches, 1);
        assert_eq!(outcome.table.rows()[0], vec!["A", "2024-02-02"]);
    }

    #[tokio::test]
    async fn test_collect_paginates_and_counts_skips() {
        let mut page = SnapshotPage::new(
            "about:blank",
            vec![page_html(&["A", ""], true), page_html(&["C"], false)],
        );
        let outcome = scraper(RevealConfig::Paginate {
            next_selector: "a.next".to_string(),
            settle_ms: 0,
            max_pages: 100,
        })
        .collect(&mut page)
        .await
        .unwrap();

        assert_eq!(outcome.summary.batches, 2);
        assert_eq!(outcome.summary.cards_skipped, 1);
        let titles: Vec<&str> = outcome.table.rows().iter().map(|r| r[0].as_str()).collect();
        assert_eq!(titles, vec!["A", "C"]);
    }

    #[test]
    fn test_invalid_source_is_rejected() {
        let mut config = source(RevealConfig::default());
        config.fields.clear();
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let result = ListingScraper::new("bad", config, DateNormalizer::new(2024, today, DayOrder::DayFirst));
        assert!(matches!(result, Err(ScrapeError::Config(ConfigError::NoFields))));
    }

    #[test]
    fn test_summary_display() {
        let summary = RunSummary {
            source: "evvnt".to_string(),
            records_written: 3,
            cards_skipped: 1,
            batches: 2,
            field_failures: 4,
            output: Some(PathBuf::from("data/evvnt.csv")),
        };
        assert_eq!(
            summary.to_string(),
            "evvnt: 3 records (1 cards skipped, 2 batches, 4 field failures) -> data/evvnt.csv"
        );
    }
}
