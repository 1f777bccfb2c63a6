//! Live Chrome tabs behind the listing page abstraction.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::scrapers::page::{Element, ListingPage, PageError};

/// Resolves once the document is loaded and no new resources have been
/// requested for half a second.
const NETWORK_IDLE_SCRIPT: &str = r#"
    new Promise((resolve) => {
        const settle = () => {
            let last = performance.getEntriesByType('resource').length;
            const check = () => {
                const now = performance.getEntriesByType('resource').length;
                if (now === last) {
                    resolve(document.readyState);
                } else {
                    last = now;
                    setTimeout(check, 500);
                }
            };
            setTimeout(check, 500);
        };
        if (document.readyState === 'complete') {
            settle();
        } else {
            window.addEventListener('load', settle);
        }
    })
"#;

const SCROLL_HEIGHT_SCRIPT: &str = "document.body.scrollHeight";

const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight)";

const INTERACTABLE_FN: &str = r#"
    function() {
        const style = window.getComputedStyle(this);
        const rect = this.getBoundingClientRect();
        return !this.disabled
            && this.getAttribute('aria-disabled') !== 'true'
            && style.display !== 'none'
            && style.visibility !== 'hidden'
            && rect.width > 0
            && rect.height > 0;
    }
"#;

fn query_error(selector: &str, e: impl std::fmt::Display) -> PageError {
    PageError::Query {
        selector: selector.to_string(),
        message: e.to_string(),
    }
}

/// One Chrome tab.
pub struct ChromePage {
    page: Page,
    browser: Arc<Mutex<Browser>>,
    url: String,
    timeout: Duration,
}

impl ChromePage {
    pub(crate) fn new(page: Page, browser: Arc<Mutex<Browser>>, timeout: Duration) -> Self {
        Self {
            page,
            browser,
            url: "about:blank".to_string(),
            timeout,
        }
    }

    async fn goto(&self, url: &str) -> Result<(), PageError> {
        tokio::time::timeout(self.timeout, self.page.goto(url))
            .await
            .map_err(|_| PageError::Navigation {
                url: url.to_string(),
                message: format!("timed out after {}s", self.timeout.as_secs()),
            })?
            .map_err(|e| PageError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn run_script(&self, script: &str) -> Result<serde_json::Value, PageError> {
        let result = self
            .page
            .evaluate(script.to_string())
            .await
            .map_err(|e| PageError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl ListingPage for ChromePage {
    type Element = ChromeElement;

    fn url(&self) -> &str {
        &self.url
    }

    async fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        debug!("Navigating to {}", url);
        self.goto(url).await?;
        self.url = url.to_string();
        Ok(())
    }

    async fn wait_for_network_idle(&self) -> Result<(), PageError> {
        match tokio::time::timeout(self.timeout, self.page.evaluate(NETWORK_IDLE_SCRIPT.to_string()))
            .await
        {
            Ok(Ok(result)) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
                Ok(())
            }
            Ok(Err(e)) => Err(PageError::Script(e.to_string())),
            Err(_) => {
                warn!("Timeout waiting for network idle on {}", self.url);
                Ok(())
            }
        }
    }

    async fn scroll_height(&self) -> Result<u64, PageError> {
        let value = self.run_script(SCROLL_HEIGHT_SCRIPT).await?;
        value
            .as_u64()
            .or_else(|| value.as_f64().map(|h| h as u64))
            .ok_or_else(|| PageError::Script(format!("unexpected scroll height {}", value)))
    }

    async fn scroll_to_bottom(&self) -> Result<(), PageError> {
        self.run_script(SCROLL_TO_BOTTOM_SCRIPT).await?;
        Ok(())
    }

    async fn query_one(&self, selector: &str) -> Result<Option<ChromeElement>, PageError> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ChromeElement>, PageError> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| query_error(selector, e))?;
        Ok(elements.into_iter().map(ChromeElement::new).collect())
    }

    async fn open_view(&self, url: &str) -> Result<Self, PageError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| PageError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let mut view = ChromePage::new(page, Arc::clone(&self.browser), self.timeout);
        if let Err(e) = view.navigate(url).await {
            if let Err(close_err) = view.close().await {
                debug!(url, error = %close_err, "Failed to close detail tab");
            }
            return Err(e);
        }
        Ok(view)
    }

    async fn close(self) -> Result<(), PageError> {
        self.page
            .close()
            .await
            .map_err(|e| PageError::Closed(e.to_string()))
    }
}

/// A DOM node in a Chrome tab.
pub struct ChromeElement {
    element: chromiumoxide::Element,
}

impl ChromeElement {
    fn new(element: chromiumoxide::Element) -> Self {
        Self { element }
    }
}

#[async_trait]
impl Element for ChromeElement {
    async fn query_one(&self, selector: &str) -> Result<Option<Self>, PageError> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Self>, PageError> {
        let elements = self
            .element
            .find_elements(selector)
            .await
            .map_err(|e| query_error(selector, e))?;
        Ok(elements.into_iter().map(ChromeElement::new).collect())
    }

    async fn inner_text(&self) -> Result<String, PageError> {
        self.element
            .inner_text()
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| PageError::Detached(e.to_string()))
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, PageError> {
        self.element
            .attribute(name)
            .await
            .map_err(|e| PageError::Detached(e.to_string()))
    }

    async fn click(&self) -> Result<(), PageError> {
        self.element
            .click()
            .await
            .map(|_| ())
            .map_err(|e| PageError::Detached(e.to_string()))
    }

    async fn is_interactable(&self) -> Result<bool, PageError> {
        let returns = self
            .element
            .call_js_fn(INTERACTABLE_FN, false)
            .await
            .map_err(|e| PageError::Detached(e.to_string()))?;
        Ok(returns
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }
}
