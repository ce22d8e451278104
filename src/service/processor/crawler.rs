//! Bounded same-origin crawler.
//!
//! Breadth-first from the root, deduplicating by canonical URL
//! (scheme + host + path + sorted query, fragment dropped), capped by page
//! count and by a total time budget. The root page failing is fatal for the
//! job; any other page failing is recorded on its snapshot and the crawl
//! continues. Redirect chains are broken at depth 5 by the HTTP client.

use reqwest::redirect::Policy;
use reqwest::Client;
use scraper::Html;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use url::Url;

use crate::domain::models::{CrawlOutcome, PageSnapshot, SiteContext};
use crate::error::{AppError, Result};
use crate::extractor::PageExtractor;

const USER_AGENT: &str = concat!(
    "barrierefrei-audit/",
    env!("CARGO_PKG_VERSION"),
    " (+wcag-analysis)"
);

pub struct Crawler {
    client: Client,
    crawl_budget: Duration,
}

impl Crawler {
    pub fn new(fetch_timeout: Duration, crawl_budget: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(fetch_timeout)
            .redirect(Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::Other(anyhow::anyhow!("failed to build crawler client: {e}")))?;

        Ok(Self {
            client,
            crawl_budget,
        })
    }

    /// Crawl up to `max_pages` same-origin pages starting at `root`.
    pub async fn crawl(
        &self,
        root: &Url,
        max_pages: usize,
        cancel_flag: &AtomicBool,
    ) -> Result<CrawlOutcome> {
        let started = Instant::now();
        let mut pages: Vec<PageSnapshot> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<Url> = VecDeque::new();

        queue.push_back(root.clone());
        visited.insert(canonical_url(root));

        while let Some(url) = queue.pop_front() {
            if pages.len() >= max_pages {
                break;
            }
            if cancel_flag.load(Ordering::Relaxed) {
                log::info!("Crawl cancelled after {} pages", pages.len());
                break;
            }
            if started.elapsed() > self.crawl_budget && !pages.is_empty() {
                log::warn!("Crawl budget exhausted after {} pages", pages.len());
                break;
            }

            let is_root = pages.is_empty();
            match self.fetch_page(&url).await {
                Ok((snapshot, body)) => {
                    // All DOM work happens here, before the next await.
                    let discovered = same_origin_links(&body, &snapshot, root);
                    for link in discovered {
                        if visited.len() >= max_pages * 4 {
                            // Frontier cap so link-heavy pages cannot balloon the set.
                            break;
                        }
                        if visited.insert(canonical_url(&link)) {
                            queue.push_back(link);
                        }
                    }
                    pages.push(snapshot);
                }
                Err(e) if is_root => {
                    return Err(AppError::CrawlFatal(format!("{}: {}", url, e)));
                }
                Err(e) => {
                    log::warn!("Failed to fetch {}: {}", url, e);
                    pages.push(PageSnapshot {
                        url: url.to_string(),
                        final_url: None,
                        status_code: None,
                        fetch_time_ms: 0,
                        content_length: 0,
                        title: None,
                        lang: None,
                        html: String::new(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let failed_pages = pages.iter().filter(|p| !p.is_ok()).count();
        if failed_pages > 0 {
            let partial = AppError::CrawlPartial {
                failed: failed_pages,
                attempted: pages.len(),
            };
            log::warn!("{}", partial);
        }

        let context = self.probe_context(root).await;

        Ok(CrawlOutcome {
            root_url: pages
                .first()
                .and_then(|p| p.final_url.clone())
                .unwrap_or_else(|| root.to_string()),
            pages,
            failed_pages,
            context,
        })
    }

    async fn fetch_page(&self, url: &Url) -> anyhow::Result<(PageSnapshot, String)> {
        let started = Instant::now();
        let response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        let final_url = response.url().to_string();
        let body = response.text().await?;
        let fetch_time_ms = started.elapsed().as_millis() as u64;

        // Parse synchronously for the lightweight per-page metadata.
        let (title, lang) = {
            let html = Html::parse_document(&body);
            (
                PageExtractor::extract_title(&html),
                PageExtractor::extract_lang(&html),
            )
        };

        let snapshot = PageSnapshot {
            url: url.to_string(),
            final_url: (final_url != url.as_str()).then_some(final_url),
            status_code: Some(status.as_u16()),
            fetch_time_ms,
            content_length: body.len(),
            title,
            lang,
            html: body.clone(),
            // Error pages (4xx/5xx) still carry auditable content; only
            // transport failures mark a page as failed.
            error: None,
        };

        Ok((snapshot, body))
    }

    /// Existence probes for robots.txt and sitemap.xml plus the HTTPS flag.
    /// Pure metadata; nothing here gates the crawl.
    async fn probe_context(&self, root: &Url) -> SiteContext {
        let probe = |path: &'static str| {
            let client = self.client.clone();
            let url = root.join(path).ok();
            async move {
                match url {
                    Some(url) => client
                        .get(url)
                        .send()
                        .await
                        .map(|r| r.status().is_success())
                        .unwrap_or(false),
                    None => false,
                }
            }
        };

        let (robots_txt, sitemap) = tokio::join!(probe("/robots.txt"), probe("/sitemap.xml"));

        SiteContext {
            robots_txt,
            sitemap,
            ssl: root.scheme() == "https",
        }
    }
}

/// Canonical form for dedup: scheme + host + path + sorted query.
pub fn canonical_url(url: &Url) -> String {
    let mut canonical = format!(
        "{}://{}{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.path()
    );
    if let Some(port) = url.port() {
        canonical = format!(
            "{}://{}:{}{}",
            url.scheme(),
            url.host_str().unwrap_or_default(),
            port,
            url.path()
        );
    }

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !params.is_empty() {
        params.sort();
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        canonical.push('?');
        canonical.push_str(&query);
    }

    canonical
}

/// Same-origin links of a fetched page, resolved against its final URL.
fn same_origin_links(body: &str, snapshot: &PageSnapshot, root: &Url) -> Vec<Url> {
    if snapshot
        .status_code
        .map_or(true, |s| !(200..300).contains(&s))
    {
        return Vec::new();
    }

    let base = snapshot
        .final_url
        .as_deref()
        .and_then(|u| Url::parse(u).ok())
        .unwrap_or_else(|| root.clone());

    let html = Html::parse_document(body);
    PageExtractor::extract_links(&html, base.as_str())
        .into_iter()
        .filter(|l| l.is_internal && !l.href.starts_with('#'))
        .filter_map(|l| Url::parse(&l.href).ok())
        .filter(|u| u.host_str() == root.host_str() && u.port() == root.port())
        .map(|mut u| {
            u.set_fragment(None);
            u
        })
        .collect()
}
