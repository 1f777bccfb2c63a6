//! Listing page backed by saved HTML snapshots.
//!
//! Each snapshot is the rendered DOM after one more reveal step: scrolling
//! or clicking a control moves to the next snapshot. Detail views are
//! looked up in a URL → HTML map. Used to replay captured listings offline.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::page::{Element, ListingPage, PageError};

struct Snapshots {
    docs: Vec<String>,
    heights: Option<Vec<u64>>,
    cursor: AtomicUsize,
}

impl Snapshots {
    fn new(docs: Vec<String>) -> Self {
        Self {
            docs,
            heights: None,
            cursor: AtomicUsize::new(0),
        }
    }

    fn current(&self) -> &str {
        let idx = self.cursor.load(Ordering::SeqCst);
        self.docs.get(idx).map(|s| s.as_str()).unwrap_or("")
    }

    /// Move to the next snapshot. Returns `false` at the last one.
    fn advance(&self) -> bool {
        let idx = self.cursor.load(Ordering::SeqCst);
        if idx + 1 < self.docs.len() {
            self.cursor.store(idx + 1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector, PageError> {
    Selector::parse(selector).map_err(|_| PageError::InvalidSelector(selector.to_string()))
}

/// A [`ListingPage`] replaying saved HTML.
pub struct SnapshotPage {
    url: String,
    snapshots: Arc<Snapshots>,
    details: Arc<HashMap<String, String>>,
    open_views: Arc<AtomicUsize>,
    is_view: bool,
}

impl SnapshotPage {
    /// Page showing `snapshots[0]` at `url`.
    pub fn new(url: impl Into<String>, snapshots: Vec<String>) -> Self {
        Self {
            url: url.into(),
            snapshots: Arc::new(Snapshots::new(snapshots)),
            details: Arc::new(HashMap::new()),
            open_views: Arc::new(AtomicUsize::new(0)),
            is_view: false,
        }
    }

    /// Load snapshots from HTML files, in order.
    pub fn from_files<P: AsRef<Path>>(url: impl Into<String>, paths: &[P]) -> std::io::Result<Self> {
        let docs = paths
            .iter()
            .map(std::fs::read_to_string)
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok(Self::new(url, docs))
    }

    /// Detail views available through [`ListingPage::open_view`].
    pub fn with_details(mut self, details: HashMap<String, String>) -> Self {
        self.details = Arc::new(details);
        self
    }

    /// Explicit scroll heights, one per snapshot.
    pub fn with_heights(mut self, heights: Vec<u64>) -> Self {
        let docs = self.snapshots.docs.clone();
        self.snapshots = Arc::new(Snapshots {
            docs,
            heights: Some(heights),
            cursor: AtomicUsize::new(0),
        });
        self
    }

    /// Secondary views currently open.
    pub fn open_views(&self) -> usize {
        self.open_views.load(Ordering::SeqCst)
    }

    /// Index of the snapshot currently shown.
    pub fn position(&self) -> usize {
        self.snapshots.cursor.load(Ordering::SeqCst)
    }

    fn select(&self, selector: &str) -> Result<Vec<SnapshotElement>, PageError> {
        let selector = parse_selector(selector)?;
        let doc = Html::parse_document(self.snapshots.current());
        Ok(doc
            .select(&selector)
            .map(|el| SnapshotElement {
                html: el.html(),
                snapshots: Arc::clone(&self.snapshots),
            })
            .collect())
    }
}

#[async_trait]
impl ListingPage for SnapshotPage {
    type Element = SnapshotElement;

    fn url(&self) -> &str {
        &self.url
    }

    async fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        debug!(url, "Replaying snapshots");
        self.url = url.to_string();
        self.snapshots.cursor.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn wait_for_network_idle(&self) -> Result<(), PageError> {
        Ok(())
    }

    async fn scroll_height(&self) -> Result<u64, PageError> {
        let idx = self.snapshots.cursor.load(Ordering::SeqCst);
        match &self.snapshots.heights {
            Some(heights) => heights.get(idx).copied().ok_or_else(|| {
                PageError::Script(format!("no scroll height recorded for snapshot {}", idx))
            }),
            None => Ok(self.snapshots.current().len() as u64),
        }
    }

    async fn scroll_to_bottom(&self) -> Result<(), PageError> {
        self.snapshots.advance();
        Ok(())
    }

    async fn query_one(&self, selector: &str) -> Result<Option<SnapshotElement>, PageError> {
        Ok(self.select(selector)?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<SnapshotElement>, PageError> {
        self.select(selector)
    }

    async fn open_view(&self, url: &str) -> Result<Self, PageError> {
        let html = self.details.get(url).ok_or_else(|| PageError::Navigation {
            url: url.to_string(),
            message: "no snapshot for detail page".to_string(),
        })?;
        self.open_views.fetch_add(1, Ordering::SeqCst);
        Ok(Self {
            url: url.to_string(),
            snapshots: Arc::new(Snapshots::new(vec![html.clone()])),
            details: Arc::clone(&self.details),
            open_views: Arc::clone(&self.open_views),
            is_view: true,
        })
    }

    async fn close(self) -> Result<(), PageError> {
        if self.is_view {
            self.open_views.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// An element of a snapshot, held as its outer HTML.
#[derive(Clone)]
pub struct SnapshotElement {
    html: String,
    snapshots: Arc<Snapshots>,
}

impl SnapshotElement {
    fn with_root<T>(&self, f: impl FnOnce(ElementRef<'_>) -> T) -> Result<T, PageError> {
        let fragment = Html::parse_fragment(&self.html);
        let root = fragment
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .next()
            .ok_or_else(|| PageError::Detached("element fragment is empty".to_string()))?;
        Ok(f(root))
    }

    fn select(&self, selector: &str) -> Result<Vec<SnapshotElement>, PageError> {
        let selector = parse_selector(selector)?;
        self.with_root(|root| {
            root.select(&selector)
                .map(|el| SnapshotElement {
                    html: el.html(),
                    snapshots: Arc::clone(&self.snapshots),
                })
                .collect()
        })
    }
}

#[async_trait]
impl Element for SnapshotElement {
    async fn query_one(&self, selector: &str) -> Result<Option<Self>, PageError> {
        Ok(self.select(selector)?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Self>, PageError> {
        self.select(selector)
    }

    async fn inner_text(&self) -> Result<String, PageError> {
        self.with_root(|root| root.text().collect::<Vec<_>>().join(" "))
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, PageError> {
        self.with_root(|root| root.value().attr(name).map(str::to_string))
    }

    async fn click(&self) -> Result<(), PageError> {
        if self.snapshots.advance() {
            Ok(())
        } else {
            Err(PageError::Detached("no snapshot after this one".to_string()))
        }
    }

    async fn is_interactable(&self) -> Result<bool, PageError> {
        self.with_root(|root| {
            let el = root.value();
            let disabled = el.attr("disabled").is_some()
                || el.attr("hidden").is_some()
                || el.attr("aria-disabled") == Some("true")
                || el.classes().any(|c| c == "disabled");
            !disabled
        })
    }
}
