//! Rendered-page abstraction used by the extraction pipeline.
//!
//! The pipeline never talks to a browser directly. It drives a
//! [`ListingPage`] and reads [`Element`] handles, which lets the same
//! reveal/extract code run against a live Chromium tab or saved HTML.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a page or element handle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("Navigation failed for {url}: {message}")]
    Navigation { url: String, message: String },
    #[error("Script evaluation failed: {0}")]
    Script(String),
    #[error("Query '{selector}' failed: {message}")]
    Query { selector: String, message: String },
    #[error("Invalid selector '{0}'")]
    InvalidSelector(String),
    #[error("Element is detached or stale: {0}")]
    Detached(String),
    #[error("Page closed: {0}")]
    Closed(String),
}

/// A DOM node inside a rendered page.
#[async_trait]
pub trait Element: Send + Sync + Sized {
    /// First descendant matching `selector`, if any.
    async fn query_one(&self, selector: &str) -> Result<Option<Self>, PageError>;

    /// All descendants matching `selector`, in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<Self>, PageError>;

    /// Rendered text of the node.
    async fn inner_text(&self) -> Result<String, PageError>;

    /// Attribute value, `None` when the attribute is absent.
    async fn attribute(&self, name: &str) -> Result<Option<String>, PageError>;

    async fn click(&self) -> Result<(), PageError>;

    /// Whether the node is visible and not disabled.
    async fn is_interactable(&self) -> Result<bool, PageError>;
}

/// A rendered document that can be navigated, scrolled and queried.
#[async_trait]
pub trait ListingPage: Send + Sync + Sized {
    type Element: Element;

    /// URL the page currently shows (base for relative links).
    fn url(&self) -> &str;

    async fn navigate(&mut self, url: &str) -> Result<(), PageError>;

    /// Wait until network activity settles after a navigation.
    async fn wait_for_network_idle(&self) -> Result<(), PageError>;

    /// Current `document.body.scrollHeight`.
    async fn scroll_height(&self) -> Result<u64, PageError>;

    async fn scroll_to_bottom(&self) -> Result<(), PageError>;

    async fn query_one(&self, selector: &str) -> Result<Option<Self::Element>, PageError>;

    async fn query_all(&self, selector: &str) -> Result<Vec<Self::Element>, PageError>;

    /// Open a secondary view (new tab) on `url`.
    async fn open_view(&self, url: &str) -> Result<Self, PageError>;

    /// Dispose of the page.
    async fn close(self) -> Result<(), PageError>;
}
