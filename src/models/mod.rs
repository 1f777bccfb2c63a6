//! Data models for event-scrape.

mod record;

pub use record::{FieldValue, Record, SENTINEL};
