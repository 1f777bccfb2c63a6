//! Listing scrapers.
//!
//! A source is revealed through a [`ListingPage`] (a live Chrome tab or saved
//! snapshots), its cards are turned into records and collected into a table.

pub mod browser;
pub mod config;
pub mod extract;
pub mod page;
pub mod pipeline;
pub mod reveal;
pub mod snapshot;

#[cfg(feature = "browser")]
pub use browser::{ChromeElement, ChromePage};
pub use browser::{BrowserEngineConfig, BrowserSession};
pub use config::{ConfigError, FieldKind, FieldSpec, OutputConfig, RevealConfig, SourceConfig};
pub use extract::{ExtractionFailure, RecordExtractor};
pub use page::{Element, ListingPage, PageError};
pub use pipeline::{ListingScraper, RunOutcome, RunSummary, ScrapeError};
pub use reveal::{PageState, PaginateReveal, Reveal, ScrollReveal};
pub use snapshot::{SnapshotElement, SnapshotPage};
