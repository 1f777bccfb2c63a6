//! Page revelation strategies.
//!
//! A strategy pulls card batches out of a [`ListingPage`], loading more of
//! the listing between batches. Batches are handed out one at a time so the
//! caller finishes extracting a batch before the DOM changes again.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::config::RevealConfig;
use super::page::{Element, ListingPage};

async fn query_cards<P: ListingPage>(page: &P, selector: &str) -> Vec<P::Element> {
    match page.query_all(selector).await {
        Ok(cards) => cards,
        Err(e) => {
            error!(error = %e, selector, "Card query failed");
            Vec::new()
        }
    }
}

/// Scroll to the bottom until the page stops growing.
#[derive(Debug, Clone)]
pub struct ScrollReveal {
    max_steps: u32,
    pause: Duration,
    interleave: bool,
    steps: u32,
    handed_out: usize,
    started: bool,
    done: bool,
}

impl ScrollReveal {
    pub fn new(max_steps: u32, pause: Duration) -> Self {
        Self {
            max_steps,
            pause,
            interleave: false,
            steps: 0,
            handed_out: 0,
            started: false,
            done: false,
        }
    }

    /// Yield newly-appeared cards after every scroll step.
    pub fn interleaved(mut self) -> Self {
        self.interleave = true;
        self
    }

    /// Scroll steps performed so far.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// One scroll step. Returns `true` when the page grew.
    async fn step<P: ListingPage>(&mut self, page: &P) -> bool {
        let before = match page.scroll_height().await {
            Ok(h) => h,
            Err(e) => {
                error!(error = %e, "Failed to read scroll height");
                return false;
            }
        };

        if let Err(e) = page.scroll_to_bottom().await {
            error!(error = %e, "Scroll failed");
            return false;
        }
        self.steps += 1;
        tokio::time::sleep(self.pause).await;

        match page.scroll_height().await {
            Ok(after) if after != before => {
                debug!(step = self.steps, height = after, "Scrolled, new content loaded");
                true
            }
            Ok(_) => {
                info!(step = self.steps, "No new content loaded");
                false
            }
            Err(e) => {
                error!(error = %e, "Failed to read scroll height");
                false
            }
        }
    }

    /// Next batch of cards, or `None` once the listing is exhausted.
    pub async fn next_batch<P: ListingPage>(
        &mut self,
        page: &P,
        card_selector: &str,
    ) -> Option<Vec<P::Element>> {
        if self.done {
            return None;
        }

        if !self.interleave {
            while self.steps < self.max_steps {
                if !self.step(page).await {
                    break;
                }
            }
            self.done = true;
            let cards = query_cards(page, card_selector).await;
            info!(steps = self.steps, cards = cards.len(), "Scrolling complete");
            return Some(cards);
        }

        // The first batch is what the page already shows; each later batch
        // is whatever the next scroll step added.
        if self.started && (self.steps >= self.max_steps || !self.step(page).await) {
            self.done = true;
            info!(steps = self.steps, cards = self.handed_out, "Scrolling complete");
            return None;
        }
        self.started = true;

        let fresh: Vec<P::Element> = query_cards(page, card_selector)
            .await
            .into_iter()
            .skip(self.handed_out)
            .collect();
        self.handed_out += fresh.len();
        debug!(step = self.steps, new_cards = fresh.len(), "Revealed batch");
        Some(fresh)
    }
}

/// Pagination progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Page `n` (1-based) is loaded and its cards not yet handed out.
    AwaitingPage(u32),
    /// Cards of page `n` were handed out; the next call advances.
    Extracted(u32),
    Done,
}

/// Click a "next" control until it disappears or is disabled.
#[derive(Debug, Clone)]
pub struct PaginateReveal {
    next_selector: String,
    settle: Duration,
    max_pages: u32,
    state: PageState,
}

impl PaginateReveal {
    pub fn new(next_selector: impl Into<String>, settle: Duration, max_pages: u32) -> Self {
        Self {
            next_selector: next_selector.into(),
            settle,
            max_pages,
            state: PageState::AwaitingPage(1),
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    /// Click through to the following page. Returns `false` at the end.
    async fn advance<P: ListingPage>(&self, page: &P, current: u32) -> bool {
        let control = match page.query_one(&self.next_selector).await {
            Ok(Some(control)) => control,
            Ok(None) => {
                info!(page = current, "No next control, pagination complete");
                return false;
            }
            Err(e) => {
                error!(page = current, error = %e, "Next control lookup failed");
                return false;
            }
        };

        match control.is_interactable().await {
            Ok(true) => {}
            Ok(false) => {
                info!(page = current, "Next control disabled, pagination complete");
                return false;
            }
            Err(e) => {
                error!(page = current, error = %e, "Next control is not usable");
                return false;
            }
        }

        if let Err(e) = control.click().await {
            error!(page = current, error = %e, "Clicking next failed, stopping pagination");
            return false;
        }

        tokio::time::sleep(self.settle).await;
        debug!(page = current + 1, "Advanced to next page");
        true
    }

    /// Next page of cards, or `None` once pagination is exhausted.
    pub async fn next_batch<P: ListingPage>(
        &mut self,
        page: &P,
        card_selector: &str,
    ) -> Option<Vec<P::Element>> {
        if let PageState::Extracted(n) = self.state {
            if n >= self.max_pages {
                warn!(max_pages = self.max_pages, "Page ceiling reached, stopping pagination");
                self.state = PageState::Done;
            } else if self.advance(page, n).await {
                self.state = PageState::AwaitingPage(n + 1);
            } else {
                self.state = PageState::Done;
            }
        }

        match self.state {
            PageState::AwaitingPage(n) => {
                let cards = query_cards(page, card_selector).await;
                info!(page = n, cards = cards.len(), "Page revealed");
                self.state = PageState::Extracted(n);
                Some(cards)
            }
            _ => None,
        }
    }
}

/// Either reveal strategy, built from configuration.
#[derive(Debug, Clone)]
pub enum Reveal {
    Scroll(ScrollReveal),
    Paginate(PaginateReveal),
}

impl Reveal {
    pub fn from_config(config: &RevealConfig) -> Self {
        match config {
            RevealConfig::Scroll {
                max_steps,
                pause_ms,
                interleave,
            } => {
                let scroll = ScrollReveal::new(*max_steps, Duration::from_millis(*pause_ms));
                Reveal::Scroll(if *interleave {
                    scroll.interleaved()
                } else {
                    scroll
                })
            }
            RevealConfig::Paginate {
                next_selector,
                settle_ms,
                max_pages,
            } => Reveal::Paginate(PaginateReveal::new(
                next_selector.clone(),
                Duration::from_millis(*settle_ms),
                *max_pages,
            )),
        }
    }

    pub async fn next_batch<P: ListingPage>(
        &mut self,
        page: &P,
        card_selector: &str,
    ) -> Option<Vec<P::Element>> {
        match self {
            Reveal::Scroll(s) => s.next_batch(page, card_selector).await,
            Reveal::Paginate(p) => p.next_batch(page, card_selector).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::snapshot::SnapshotPage;

    fn listing(cards: usize) -> String {
        let items: String = (0..cards)
            .map(|i| format!("<div class=\"card\"><h3>Event {}</h3></div>", i))
            .collect();
        format!("<html><body>{}</body></html>", items)
    }

    fn paged(cards: &[&str], next: Option<&str>) -> String {
        let items: String = cards
            .iter()
            .map(|t| format!("<div class=\"card\"><h3>{}</h3></div>", t))
            .collect();
        format!("<html><body>{}{}</body></html>", items, next.unwrap_or(""))
    }

    #[tokio::test]
    async fn test_scroll_respects_step_budget() {
        let snapshots: Vec<String> = (1..=10).map(listing).collect();
        let page = SnapshotPage::new("https://example.com/", snapshots);
        let mut reveal = ScrollReveal::new(5, Duration::ZERO);

        let batch = reveal.next_batch(&page, "div.card").await.unwrap();
        assert_eq!(reveal.steps(), 5);
        assert_eq!(batch.len(), 6);
        assert!(reveal.next_batch(&page, "div.card").await.is_none());
    }

    #[tokio::test]
    async fn test_scroll_stops_when_height_stable() {
        let page = SnapshotPage::new("https://example.com/", vec![listing(2), listing(4)]);
        let mut reveal = ScrollReveal::new(5, Duration::ZERO);

        let batch = reveal.next_batch(&page, "div.card").await.unwrap();
        // step 1 grows the page, step 2 sees the same height
        assert_eq!(reveal.steps(), 2);
        assert_eq!(batch.len(), 4);
    }

    #[tokio::test]
    async fn test_scroll_empty_listing_is_empty_batch() {
        let page = SnapshotPage::new("https://example.com/", vec![listing(0)]);
        let mut reveal = ScrollReveal::new(5, Duration::ZERO);
        let batch = reveal.next_batch(&page, "div.card").await.unwrap();
        assert!(batch.is_empty());
        assert_eq!(reveal.steps(), 1);
    }

    #[tokio::test]
    async fn test_scroll_height_failure_keeps_loaded_cards() {
        // No height is recorded for the second snapshot
        let page = SnapshotPage::new("https://example.com/", vec![listing(2), listing(4)])
            .with_heights(vec![100]);
        let mut reveal = ScrollReveal::new(5, Duration::ZERO);

        let batch = reveal.next_batch(&page, "div.card").await.unwrap();
        assert_eq!(reveal.steps(), 1);
        assert_eq!(batch.len(), 4);
        assert!(reveal.next_batch(&page, "div.card").await.is_none());
    }

    #[tokio::test]
    async fn test_scroll_height_unreadable_before_first_step() {
        let page = SnapshotPage::new("https://example.com/", vec![listing(3), listing(6)])
            .with_heights(Vec::new());
        let mut reveal = ScrollReveal::new(5, Duration::ZERO);

        let batch = reveal.next_batch(&page, "div.card").await.unwrap();
        assert_eq!(reveal.steps(), 0);
        assert_eq!(batch.len(), 3);
        assert_eq!(page.position(), 0);
    }

    #[tokio::test]
    async fn test_scroll_interleaved_yields_deltas() {
        let page = SnapshotPage::new(
            "https://example.com/",
            vec![listing(2), listing(3), listing(5)],
        );
        let mut reveal = ScrollReveal::new(5, Duration::ZERO).interleaved();

        let mut sizes = Vec::new();
        while let Some(batch) = reveal.next_batch(&page, "div.card").await {
            sizes.push(batch.len());
        }
        assert_eq!(sizes, vec![2, 1, 2]);
        assert_eq!(reveal.steps(), 3);
    }

    #[tokio::test]
    async fn test_paginate_stops_when_next_absent() {
        let next = r#"<a class="next" href="?page=2">Next</a>"#;
        let page = SnapshotPage::new(
            "https://example.com/",
            vec![
                paged(&["A", "B"], Some(next)),
                paged(&["C"], Some(next)),
                paged(&["D", "E"], None),
            ],
        );
        let mut reveal = PaginateReveal::new("a.next", Duration::ZERO, 100);

        let mut batches = Vec::new();
        while let Some(batch) = reveal.next_batch(&page, "div.card").await {
            batches.push(batch.len());
        }
        assert_eq!(batches, vec![2, 1, 2]);
        assert_eq!(reveal.state(), PageState::Done);
    }

    #[tokio::test]
    async fn test_paginate_stops_on_disabled_next() {
        let page = SnapshotPage::new(
            "https://example.com/",
            vec![
                paged(&["A"], Some(r#"<button class="next">Next</button>"#)),
                paged(&["B"], Some(r#"<button class="next" disabled>Next</button>"#)),
            ],
        );
        let mut reveal = PaginateReveal::new("button.next", Duration::ZERO, 100);

        let mut count = 0;
        while reveal.next_batch(&page, "div.card").await.is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_paginate_click_failure_ends_run() {
        // The control is always present but there is no page to advance to
        let page = SnapshotPage::new(
            "https://example.com/",
            vec![paged(&["A"], Some(r#"<a class="next">Next</a>"#))],
        );
        let mut reveal = PaginateReveal::new("a.next", Duration::ZERO, 100);

        assert_eq!(reveal.next_batch(&page, "div.card").await.map(|b| b.len()), Some(1));
        assert!(reveal.next_batch(&page, "div.card").await.is_none());
        assert_eq!(reveal.state(), PageState::Done);
    }

    #[tokio::test]
    async fn test_paginate_page_ceiling() {
        let next = r#"<a class="next">Next</a>"#;
        let snapshots: Vec<String> = (0..10).map(|_| paged(&["X"], Some(next))).collect();
        let page = SnapshotPage::new("https://example.com/", snapshots);
        let mut reveal = PaginateReveal::new("a.next", Duration::ZERO, 3);

        let mut count = 0;
        while reveal.next_batch(&page, "div.card").await.is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
    }
}
