//! Service layer for event-scrape domain logic.
//!
//! This module contains logic that is independent of any page or browser.

pub mod date_normalize;

pub use date_normalize::{DateError, DateNormalizer, DayOrder};
