//! Per-source scraper configuration.
//!
//! These structs define everything site-specific about a listing: where it
//! lives, how cards are found, how each field is read, and how the page is
//! revealed. The pipeline itself carries no selectors.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::services::date_normalize::DayOrder;

/// Invalid source configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid base URL '{url}': {message}")]
    BaseUrl { url: String, message: String },
    #[error("source has no fields")]
    NoFields,
    #[error("duplicate field '{0}'")]
    DuplicateField(String),
    #[error("title field '{0}' is not among the configured fields")]
    MissingTitleField(String),
    #[error("detail field '{0}' needs detail_selector and url_field")]
    IncompleteDetail(String),
    #[error("detail field '{field}' reads its URL from unknown field '{url_field}'")]
    UnknownUrlField { field: String, url_field: String },
    #[error("card selector is empty")]
    EmptyCardSelector,
}

/// Configuration of one listing source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Display name (defaults to the source id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Site root; relative links are resolved against the listing URL.
    pub base_url: String,
    /// Path of the listing page relative to `base_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_path: Option<String>,
    /// Selector matching one card per event.
    pub card_selector: String,
    /// Field whose absence invalidates a card.
    #[serde(default = "default_title_field")]
    pub title_field: String,
    /// Field rules in output column order.
    pub fields: Vec<FieldSpec>,
    /// Day/month order for all-numeric dates on this site.
    #[serde(default)]
    pub date_order: DayOrder,
    #[serde(default)]
    pub reveal: RevealConfig,
    /// Pause after the initial network-idle wait, in milliseconds.
    #[serde(default = "default_settle_ms")]
    pub initial_settle_ms: u64,
    pub output: OutputConfig,
}

/// Where and how the result table is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

/// How a single field is read from a card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Column name.
    pub name: String,
    /// Selector relative to the card; `None` reads the card itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Read this attribute instead of the inner text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    /// Take the n-th match (0-based) of `selector` instead of the first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default)]
    pub kind: FieldKind,
    /// Selector evaluated on the detail view (kind = detail).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_selector: Option<String>,
    /// Field holding the detail view URL (kind = detail).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_field: Option<String>,
}

impl FieldSpec {
    /// Plain text field read from `selector`.
    pub fn text(name: &str, selector: &str) -> Self {
        Self {
            name: name.to_string(),
            selector: Some(selector.to_string()),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.attribute = Some(attribute.to_string());
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Field read from a detail view opened on `url_field`'s URL.
    pub fn detail(name: &str, url_field: &str, detail_selector: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Detail,
            url_field: Some(url_field.to_string()),
            detail_selector: Some(detail_selector.to_string()),
            ..Default::default()
        }
    }
}

/// Post-processing applied to an extracted value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Whitespace-collapsed text.
    #[default]
    Text,
    /// Link resolved to an absolute URL.
    Url,
    /// Date text normalized to ISO-8601.
    Date,
    /// Text read from a secondary detail view.
    Detail,
}

/// How the listing is revealed before and during extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RevealConfig {
    /// Scroll to the bottom until the page height stops growing.
    Scroll {
        #[serde(default = "default_max_steps")]
        max_steps: u32,
        #[serde(default = "default_pause_ms")]
        pause_ms: u64,
        /// Yield newly-appeared cards after every step instead of one batch.
        #[serde(default)]
        interleave: bool,
    },
    /// Click a "next" control until it disappears or is disabled.
    Paginate {
        next_selector: String,
        #[serde(default = "default_settle_ms")]
        settle_ms: u64,
        #[serde(default = "default_max_pages")]
        max_pages: u32,
    },
}

impl Default for RevealConfig {
    fn default() -> Self {
        RevealConfig::Scroll {
            max_steps: default_max_steps(),
            pause_ms: default_pause_ms(),
            interleave: false,
        }
    }
}

impl RevealConfig {
    /// Short name for listings and logs.
    pub fn describe(&self) -> String {
        match self {
            RevealConfig::Scroll {
                max_steps,
                pause_ms,
                interleave,
            } => format!(
                "scroll (max {} steps, {}ms pause{})",
                max_steps,
                pause_ms,
                if *interleave { ", interleaved" } else { "" }
            ),
            RevealConfig::Paginate {
                next_selector,
                max_pages,
                ..
            } => format!("paginate (next '{}', max {} pages)", next_selector, max_pages),
        }
    }
}

fn default_title_field() -> String {
    "Title".to_string()
}

fn default_settle_ms() -> u64 {
    2000
}

fn default_pause_ms() -> u64 {
    2000
}

fn default_max_steps() -> u32 {
    5
}

fn default_max_pages() -> u32 {
    100
}

fn default_delimiter() -> char {
    ','
}

impl SourceConfig {
    /// Get the effective name, using the provided default if not set.
    pub fn name_or(&self, default: &str) -> String {
        self.name.clone().unwrap_or_else(|| default.to_string())
    }

    /// Absolute URL of the listing page.
    pub fn listing_url(&self) -> Result<String, ConfigError> {
        let base = Url::parse(&self.base_url).map_err(|e| ConfigError::BaseUrl {
            url: self.base_url.clone(),
            message: e.to_string(),
        })?;
        match self.listing_path.as_deref() {
            Some(path) if !path.is_empty() => base
                .join(path)
                .map(|u| u.to_string())
                .map_err(|e| ConfigError::BaseUrl {
                    url: format!("{}{}", self.base_url, path),
                    message: e.to_string(),
                }),
            _ => Ok(base.to_string()),
        }
    }

    /// Column names in output order.
    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Check internal consistency before a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listing_url()?;

        if self.card_selector.trim().is_empty() {
            return Err(ConfigError::EmptyCardSelector);
        }
        if self.fields.is_empty() {
            return Err(ConfigError::NoFields);
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(ConfigError::DuplicateField(field.name.clone()));
            }
        }

        if !seen.contains(self.title_field.as_str()) {
            return Err(ConfigError::MissingTitleField(self.title_field.clone()));
        }

        for field in self.fields.iter().filter(|f| f.kind == FieldKind::Detail) {
            let (Some(_), Some(url_field)) = (&field.detail_selector, &field.url_field) else {
                return Err(ConfigError::IncompleteDetail(field.name.clone()));
            };
            if !seen.contains(url_field.as_str()) {
                return Err(ConfigError::UnknownUrlField {
                    field: field.name.clone(),
                    url_field: url_field.clone(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SourceConfig {
        SourceConfig {
            name: None,
            base_url: "https://events.example.com".to_string(),
            listing_path: Some("/events".to_string()),
            card_selector: "div.card".to_string(),
            title_field: "Title".to_string(),
            fields: vec![
                FieldSpec::text("Title", "h3"),
                FieldSpec::text("URL", "a").with_attribute("href").with_kind(FieldKind::Url),
                FieldSpec::detail("Description", "URL", "div.description"),
            ],
            date_order: DayOrder::DayFirst,
            reveal: RevealConfig::default(),
            initial_settle_ms: 0,
            output: OutputConfig {
                path: "out.csv".to_string(),
                delimiter: ',',
            },
        }
    }

    #[test]
    fn test_listing_url_joins_path() {
        assert_eq!(
            sample().listing_url().unwrap(),
            "https://events.example.com/events"
        );

        let mut bare = sample();
        bare.listing_path = None;
        assert_eq!(bare.listing_url().unwrap(), "https://events.example.com/");
    }

    #[test]
    fn test_validate_accepts_sample() {
        assert_eq!(sample().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_missing_title() {
        let mut config = sample();
        config.title_field = "Name".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingTitleField("Name".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_duplicates_and_bad_detail() {
        let mut config = sample();
        config.fields.push(FieldSpec::text("Title", "h2"));
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateField("Title".to_string()))
        );

        let mut config = sample();
        config.fields[2].url_field = Some("Link".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownUrlField { .. })
        ));

        let mut config = sample();
        config.fields[2].detail_selector = None;
        assert_eq!(
            config.validate(),
            Err(ConfigError::IncompleteDetail("Description".to_string()))
        );
    }

    #[test]
    fn test_reveal_config_toml() {
        let scroll: RevealConfig = toml::from_str("strategy = \"scroll\"").unwrap();
        assert_eq!(scroll, RevealConfig::default());

        let paginate: RevealConfig =
            toml::from_str("strategy = \"paginate\"\nnext_selector = \"a.next\"").unwrap();
        assert_eq!(
            paginate,
            RevealConfig::Paginate {
                next_selector: "a.next".to_string(),
                settle_ms: 2000,
                max_pages: 100,
            }
        );
    }

    #[test]
    fn test_source_config_json_deserialization() {
        let json = r#"{
            "base_url": "https://example.com",
            "card_selector": "li.event",
            "fields": [
                {"name": "Title", "selector": "h2"},
                {"name": "Date", "selector": "time", "kind": "date"}
            ],
            "date_order": "month_first",
            "output": {"path": "data/example.csv"}
        }"#;

        let config: SourceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.title_field, "Title");
        assert_eq!(config.fields[1].kind, FieldKind::Date);
        assert_eq!(config.date_order, DayOrder::MonthFirst);
        assert_eq!(config.output.delimiter, ',');
        assert_eq!(config.initial_settle_ms, 2000);
        assert!(matches!(config.reveal, RevealConfig::Scroll { max_steps: 5, .. }));
    }
}
