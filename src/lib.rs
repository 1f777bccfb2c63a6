//! event-scrape: structured event listings from JavaScript-rendered pages.
//!
//! A listing page is revealed by scrolling or paginating, every event card
//! is extracted field by field with an `N/A` fallback, dates are normalized
//! to ISO form, and the records are written as one delimited table.

pub mod cli;
pub mod config;
pub mod models;
pub mod scrapers;
pub mod services;
pub mod storage;

pub use config::Config;
pub use models::{FieldValue, Record, SENTINEL};
pub use scrapers::{ListingScraper, RunSummary, ScrapeError, SnapshotPage, SourceConfig};
pub use services::DateNormalizer;
pub use storage::{RecordSink, SinkError, Table};
