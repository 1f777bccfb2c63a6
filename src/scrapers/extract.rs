//! Per-card field extraction.
//!
//! Every configured field is attempted independently. A failing field
//! becomes the sentinel and a warning; only a failing title drops the card.

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::config::{ConfigError, FieldKind, FieldSpec, SourceConfig};
use super::page::{Element, ListingPage, PageError};
use crate::models::{FieldValue, Record};
use crate::services::date_normalize::{DateError, DateNormalizer};

/// Why a single field could not be extracted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionFailure {
    #[error("no element matches '{0}'")]
    SelectorNotFound(String),
    #[error("match {index} of '{selector}' requested but only {found} found")]
    IndexOutOfRange {
        selector: String,
        index: usize,
        found: usize,
    },
    #[error("attribute '{0}' is missing")]
    AttributeMissing(String),
    #[error("text is empty")]
    EmptyText,
    #[error("cannot resolve link '{href}': {message}")]
    InvalidUrl { href: String, message: String },
    #[error("unrecognized date '{raw}': {source}")]
    Date { raw: String, source: DateError },
    #[error("field '{0}' holds no detail URL")]
    NoDetailUrl(String),
    #[error(transparent)]
    Page(#[from] PageError),
}

impl ExtractionFailure {
    /// Short machine-readable kind for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionFailure::SelectorNotFound(_) => "selector_not_found",
            ExtractionFailure::IndexOutOfRange { .. } => "index_out_of_range",
            ExtractionFailure::AttributeMissing(_) => "attribute_missing",
            ExtractionFailure::EmptyText => "empty_text",
            ExtractionFailure::InvalidUrl { .. } => "invalid_url",
            ExtractionFailure::Date { .. } => "date",
            ExtractionFailure::NoDetailUrl(_) => "no_detail_url",
            ExtractionFailure::Page(_) => "page",
        }
    }
}

type FieldResult = Result<FieldValue, ExtractionFailure>;

/// Collapse runs of whitespace to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

async fn read_raw<E: Element>(element: &E, attribute: Option<&str>) -> Result<String, ExtractionFailure> {
    let raw = match attribute {
        Some(name) => element
            .attribute(name)
            .await?
            .ok_or_else(|| ExtractionFailure::AttributeMissing(name.to_string()))?,
        None => element.inner_text().await?,
    };
    Ok(collapse_whitespace(&raw))
}

/// Turns cards into records according to a source's field rules.
pub struct RecordExtractor {
    fields: Vec<FieldSpec>,
    title_field: String,
    base: Url,
    normalizer: DateNormalizer,
    field_failures: usize,
}

impl RecordExtractor {
    pub fn new(source: &SourceConfig, normalizer: DateNormalizer) -> Result<Self, ConfigError> {
        let listing = source.listing_url()?;
        let base = Url::parse(&listing).map_err(|e| ConfigError::BaseUrl {
            url: listing.clone(),
            message: e.to_string(),
        })?;
        Ok(Self {
            fields: source.fields.clone(),
            title_field: source.title_field.clone(),
            base,
            normalizer,
            field_failures: 0,
        })
    }

    /// Fields that fell back to the sentinel so far.
    pub fn field_failures(&self) -> usize {
        self.field_failures
    }

    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Extract one card. `None` means the card has no usable title.
    pub async fn extract<P: ListingPage>(
        &mut self,
        page: &P,
        card: &P::Element,
        index: usize,
    ) -> Option<Record> {
        let base = Url::parse(page.url())
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .unwrap_or_else(|| self.base.clone());
        let mut results: Vec<Option<FieldResult>> = vec![None; self.fields.len()];

        for (slot, field) in results.iter_mut().zip(&self.fields) {
            if field.kind != FieldKind::Detail {
                *slot = Some(self.read_field(card, field, &base).await);
            }
        }
        if !self.title_present(&results, index, false) {
            return None;
        }

        // Detail views need the card's other fields.
        for i in 0..self.fields.len() {
            if self.fields[i].kind == FieldKind::Detail {
                let value = self.read_detail(page, &self.fields[i], &results, &base).await;
                results[i] = Some(value);
            }
        }
        if !self.title_present(&results, index, true) {
            return None;
        }

        let mut values = Vec::with_capacity(self.fields.len());
        for (field, result) in self.fields.iter().zip(results) {
            let value = match result {
                Some(Ok(value)) => value,
                Some(Err(failure)) => {
                    self.field_failures += 1;
                    warn!(
                        field = %field.name,
                        card = index,
                        kind = failure.kind(),
                        error = %failure,
                        "Field extraction failed"
                    );
                    FieldValue::Missing
                }
                None => FieldValue::Missing,
            };
            values.push((field.name.clone(), value));
        }

        debug!(card = index, "Extracted record");
        Some(Record::new(values))
    }

    /// Check the title once it has been evaluated. `final_pass` is set after
    /// detail fields ran.
    fn title_present(&self, results: &[Option<FieldResult>], index: usize, final_pass: bool) -> bool {
        let Some(pos) = self.fields.iter().position(|f| f.name == self.title_field) else {
            warn!(card = index, field = %self.title_field, "Title field not configured, skipping card");
            return false;
        };
        match &results[pos] {
            Some(Ok(value)) if !value.is_missing() && !value.to_string().trim().is_empty() => true,
            Some(Ok(_)) => {
                warn!(card = index, field = %self.title_field, "Empty title, skipping card");
                false
            }
            Some(Err(failure)) => {
                warn!(
                    card = index,
                    field = %self.title_field,
                    kind = failure.kind(),
                    error = %failure,
                    "Title missing, skipping card"
                );
                false
            }
            None => !final_pass,
        }
    }

    async fn read_field<E: Element>(&self, card: &E, field: &FieldSpec, base: &Url) -> FieldResult {
        let matched;
        let target = match field.selector.as_deref() {
            None => card,
            Some(selector) => {
                matched = match field.index {
                    Some(index) => {
                        let all = card.query_all(selector).await?;
                        let found = all.len();
                        all.into_iter().nth(index).ok_or_else(|| {
                            ExtractionFailure::IndexOutOfRange {
                                selector: selector.to_string(),
                                index,
                                found,
                            }
                        })?
                    }
                    None => card
                        .query_one(selector)
                        .await?
                        .ok_or_else(|| ExtractionFailure::SelectorNotFound(selector.to_string()))?,
                };
                &matched
            }
        };

        let text = read_raw(target, field.attribute.as_deref()).await?;
        self.convert(field.kind, text, base)
    }

    fn convert(&self, kind: FieldKind, text: String, base: &Url) -> FieldResult {
        match kind {
            FieldKind::Date => self
                .normalizer
                .normalize(&text)
                .map(FieldValue::Date)
                .map_err(|source| ExtractionFailure::Date { raw: text, source }),
            _ if text.is_empty() => Err(ExtractionFailure::EmptyText),
            FieldKind::Url => base
                .join(&text)
                .map(|url| FieldValue::Text(url.to_string()))
                .map_err(|e| ExtractionFailure::InvalidUrl {
                    href: text,
                    message: e.to_string(),
                }),
            FieldKind::Text | FieldKind::Detail => Ok(FieldValue::Text(text)),
        }
    }

    async fn read_detail<P: ListingPage>(
        &self,
        page: &P,
        field: &FieldSpec,
        results: &[Option<FieldResult>],
        base: &Url,
    ) -> FieldResult {
        let url_field = field.url_field.as_deref().unwrap_or_default();
        let href = self
            .fields
            .iter()
            .position(|f| f.name == url_field)
            .and_then(|pos| match &results[pos] {
                Some(Ok(FieldValue::Text(href))) => Some(href.clone()),
                _ => None,
            })
            .ok_or_else(|| ExtractionFailure::NoDetailUrl(url_field.to_string()))?;
        let url = base
            .join(&href)
            .map_err(|e| ExtractionFailure::InvalidUrl {
                href: href.clone(),
                message: e.to_string(),
            })?;

        let view = page.open_view(url.as_str()).await?;
        let result = self.read_from_view(&view, field, base).await;

        if let Err(e) = view.close().await {
            warn!(url = %url, error = %e, "Failed to close detail view");
        }
        result
    }

    async fn read_from_view<P: ListingPage>(&self, view: &P, field: &FieldSpec, base: &Url) -> FieldResult {
        let selector = field.detail_selector.as_deref().unwrap_or_default();
        view.wait_for_network_idle().await?;
        let element = view
            .query_one(selector)
            .await?
            .ok_or_else(|| ExtractionFailure::SelectorNotFound(selector.to_string()))?;
        let text = read_raw(&element, field.attribute.as_deref()).await?;
        self.convert(FieldKind::Detail, text, base)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDate;

    use super::*;
    use crate::scrapers::config::{OutputConfig, RevealConfig};
    use crate::scrapers::snapshot::SnapshotPage;
    use crate::services::date_normalize::DayOrder;

    fn source(fields: Vec<FieldSpec>) -> SourceConfig {
        SourceConfig {
            name: None,
            base_url: "https://example.com".to_string(),
            listing_path: Some("/events".to_string()),
            card_selector: "div.card".to_string(),
            title_field: "Title".to_string(),
            fields,
            date_order: DayOrder::DayFirst,
            reveal: RevealConfig::default(),
            initial_settle_ms: 0,
            output: OutputConfig {
                path: "out.csv".to_string(),
                delimiter: ',',
            },
        }
    }

    fn extractor(fields: Vec<FieldSpec>) -> RecordExtractor {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let normalizer = DateNormalizer::new(2024, today, DayOrder::DayFirst);
        RecordExtractor::new(&source(fields), normalizer).unwrap()
    }

    async fn cards(page: &SnapshotPage) -> Vec<<SnapshotPage as ListingPage>::Element> {
        page.query_all("div.card").await.unwrap()
    }

    const CARDS: &str = r#"<html><body>
        <div class="card">
            <h3>  Jazz
                Night </h3>
            <span class="date">TUE 18 FEB</span>
            <ul><li>Main Hall</li><li>£10</li></ul>
            <a href="/e/jazz">Info</a>
            <img src="https://cdn.example.com/jazz.png">
        </div>
        <div class="card">
            <h3>Quiz</h3>
            <span class="date">someday soon</span>
            <ul><li>Back Room</li></ul>
        </div>
        <div class="card"><h3>   </h3><span class="date">Today</span></div>
        <div class="card"><span class="date">Today</span></div>
    </body></html>"#;

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::text("Title", "h3"),
            FieldSpec::text("Date", "span.date").with_kind(FieldKind::Date),
            FieldSpec::text("Location", "li").with_index(0),
            FieldSpec::text("Price", "li").with_index(1),
            FieldSpec::text("URL", "a")
                .with_attribute("href")
                .with_kind(FieldKind::Url),
            FieldSpec::text("Image", "img").with_attribute("src"),
        ]
    }

    #[tokio::test]
    async fn test_extracts_all_fields() {
        let page = SnapshotPage::new("https://example.com/events", vec![CARDS.to_string()]);
        let cards = cards(&page).await;
        let mut extractor = extractor(fields());

        let record = extractor.extract(&page, &cards[0], 0).await.unwrap();
        assert_eq!(
            record.to_row(),
            vec![
                "Jazz Night",
                "2024-02-18",
                "Main Hall",
                "£10",
                "https://example.com/e/jazz",
                "https://cdn.example.com/jazz.png",
            ]
        );
        assert_eq!(extractor.field_failures(), 0);
    }

    #[tokio::test]
    async fn test_failing_fields_become_sentinel() {
        let page = SnapshotPage::new("https://example.com/events", vec![CARDS.to_string()]);
        let cards = cards(&page).await;
        let mut extractor = extractor(fields());

        let record = extractor.extract(&page, &cards[1], 1).await.unwrap();
        assert_eq!(record.get("Title"), Some(&FieldValue::Text("Quiz".into())));
        assert_eq!(record.get("Date"), Some(&FieldValue::Missing));
        assert_eq!(
            record.get("Location"),
            Some(&FieldValue::Text("Back Room".into()))
        );
        assert_eq!(record.get("Price"), Some(&FieldValue::Missing));
        assert_eq!(record.get("URL"), Some(&FieldValue::Missing));
        assert_eq!(record.len(), 6);
        assert_eq!(extractor.field_failures(), 4);
    }

    #[tokio::test]
    async fn test_cards_without_title_are_skipped() {
        let page = SnapshotPage::new("https://example.com/events", vec![CARDS.to_string()]);
        let cards = cards(&page).await;
        let mut extractor = extractor(fields());

        assert!(extractor.extract(&page, &cards[2], 2).await.is_none());
        assert!(extractor.extract(&page, &cards[3], 3).await.is_none());
    }

    #[tokio::test]
    async fn test_detail_field_opens_and_closes_view() {
        let mut details = HashMap::new();
        details.insert(
            "https://example.com/e/jazz".to_string(),
            "<html><body><div class=\"description\">Live  trio</div></body></html>".to_string(),
        );
        let page = SnapshotPage::new("https://example.com/events", vec![CARDS.to_string()])
            .with_details(details);
        let cards = cards(&page).await;
        let mut extractor = extractor(vec![
            FieldSpec::text("Title", "h3"),
            FieldSpec::detail("Description", "URL", "div.description"),
            FieldSpec::text("URL", "a")
                .with_attribute("href")
                .with_kind(FieldKind::Url),
        ]);

        let record = extractor.extract(&page, &cards[0], 0).await.unwrap();
        assert_eq!(
            record.names().collect::<Vec<_>>(),
            vec!["Title", "Description", "URL"]
        );
        assert_eq!(
            record.get("Description"),
            Some(&FieldValue::Text("Live trio".into()))
        );
        assert_eq!(page.open_views(), 0);

        // second card has no link, so no view is opened
        let record = extractor.extract(&page, &cards[1], 1).await.unwrap();
        assert_eq!(record.get("Description"), Some(&FieldValue::Missing));
        assert_eq!(page.open_views(), 0);
    }

    #[tokio::test]
    async fn test_detail_selector_miss_still_closes_view() {
        let mut details = HashMap::new();
        details.insert(
            "https://example.com/e/jazz".to_string(),
            "<html><body><p>nothing here</p></body></html>".to_string(),
        );
        let page = SnapshotPage::new("https://example.com/events", vec![CARDS.to_string()])
            .with_details(details);
        let cards = cards(&page).await;
        let mut extractor = extractor(vec![
            FieldSpec::text("Title", "h3"),
            FieldSpec::text("URL", "a").with_attribute("href"),
            FieldSpec::detail("Description", "URL", "div.description"),
        ]);

        let record = extractor.extract(&page, &cards[0], 0).await.unwrap();
        assert_eq!(record.get("Description"), Some(&FieldValue::Missing));
        assert_eq!(page.open_views(), 0);
    }

    #[test]
    fn test_failure_kinds() {
        assert_eq!(ExtractionFailure::EmptyText.kind(), "empty_text");
        assert_eq!(
            ExtractionFailure::from(PageError::Script("boom".into())).kind(),
            "page"
        );
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
        assert_eq!(collapse_whitespace("   "), "");
    }
}
