//! Snapshot extraction: raw crawl capture -> structural site model -> per-axis
//! slices.

pub mod page_extractor;
pub mod slices;

pub use page_extractor::{PageExtractor, PageStructure};

use serde::Serialize;

use crate::domain::models::{CrawlOutcome, SiteContext};

/// Structural/semantic model of the crawled site; input to the slicers and
/// the automated checker.
#[derive(Debug, Clone, Serialize)]
pub struct SiteSnapshot {
    pub root_url: String,
    pub context: SiteContext,
    pub pages: Vec<PageStructure>,
    pub failed_pages: usize,
}

pub struct SnapshotExtractor;

impl SnapshotExtractor {
    /// Parse every successfully fetched page. Parsing is synchronous per page
    /// (the DOM handle is not `Send`); the per-page cost is small enough to
    /// stay on the orchestrator task.
    pub fn extract(crawl: &CrawlOutcome) -> SiteSnapshot {
        let pages = crawl
            .fetched_pages()
            .map(|page| {
                let url = page.final_url.as_deref().unwrap_or(&page.url);
                PageExtractor::extract(&page.html, url)
            })
            .collect();

        SiteSnapshot {
            root_url: crawl.root_url.clone(),
            context: crawl.context.clone(),
            pages,
            failed_pages: crawl.failed_pages,
        }
    }
}
