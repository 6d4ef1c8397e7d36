// src/pipeline/crawl.rs

//! Crawl pipeline.
//!
//! A small breadth-first fetch loop drives a `CrawlSession`: documents are
//! fetched with bounded concurrency, extracted, and their fetch directives
//! become the next frontier. When the frontier is empty the session is
//! flushed to the site and its documents are archived.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use url::Url;

use crate::archive::{ArchiveReport, build_coordinators};
use crate::error::{AppError, Result};
use crate::models::Config;
use crate::services::{Extractor, HttpUpstream};
use crate::storage::LocalSite;

use super::archive::archive_files;
use super::build::{SiteReport, save_items, write_site};
use super::session::CrawlSession;

/// Per-run switches on top of the configuration.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub start_urls: Vec<String>,
    pub scrape_menu: bool,
    pub archive: bool,
}

impl CrawlOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            start_urls: config.site.start_urls.clone(),
            scrape_menu: config.site.scrape_menu,
            archive: true,
        }
    }
}

/// Totals of the fetch loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub requested: usize,
    pub documents: usize,
    pub failures: usize,
}

/// Summary of a crawl run.
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    pub fetch: FetchStats,
    pub site: SiteReport,
    pub files: usize,
    pub archive: Vec<ArchiveReport>,
}

impl CrawlSummary {
    /// Documents that failed to archive, across all backends.
    pub fn archive_failures(&self) -> usize {
        self.archive.iter().map(|r| r.failed).sum()
    }
}

/// Crawl the site, write the mirror and archive its documents.
pub async fn run_crawl(config: &Config, options: &CrawlOptions) -> Result<CrawlSummary> {
    let host = config
        .site
        .host()
        .ok_or_else(|| AppError::config(format!("No host in base URL {}", config.site.base_url)))?;
    let extractor = Extractor::from_config(config)?;
    let session = CrawlSession::new(
        extractor,
        options.scrape_menu,
        config.output.items_file.is_some(),
    );
    let http = HttpUpstream::new(&config.crawler)?;

    log::info!("Crawling {} from {} start URLs", host, options.start_urls.len());
    let fetch = fetch_all(&session, &http, &options.start_urls, config, &host).await;
    log::info!(
        "Fetched {} documents ({} failed, {} pages)",
        fetch.documents,
        fetch.failures,
        session.page_count()
    );

    let output = session.finish();
    if let Some(items_file) = &config.output.items_file {
        save_items(items_file, &output.records).await?;
    }

    let site = LocalSite::new(&config.output.site_dir, &config.site.base_url)?;
    let site_report = write_site(&site, output.menu.as_ref(), &output.pages).await?;

    let archive = if options.archive {
        let coordinators = build_coordinators(config, Arc::new(http.clone())).await?;
        archive_files(&coordinators, &output.files, config.crawler.max_concurrent).await
    } else {
        log::info!("Archiving disabled; {} documents not archived", output.files.len());
        Vec::new()
    };

    Ok(CrawlSummary {
        fetch,
        site: site_report,
        files: output.files.len(),
        archive,
    })
}

/// Breadth-first fetch loop restricted to one host.
async fn fetch_all(
    session: &CrawlSession,
    http: &HttpUpstream,
    start_urls: &[String],
    config: &Config,
    host: &str,
) -> FetchStats {
    let delay = Duration::from_millis(config.crawler.request_delay_ms);
    let concurrency = config.crawler.max_concurrent.max(1);
    let mut stats = FetchStats::default();

    let mut seen = HashSet::new();
    let mut frontier = Vec::new();
    for url in start_urls {
        match admit(url, host) {
            Some(url) => {
                if seen.insert(url.clone()) {
                    frontier.push(url);
                }
            }
            None => log::warn!("Ignoring start URL outside {}: {}", host, url),
        }
    }

    while !frontier.is_empty() {
        let batch = std::mem::take(&mut frontier);
        let mut fetches = stream::iter(batch)
            .map(|url| async move {
                let result = http.fetch_document(&url).await;
                (url, result)
            })
            .buffer_unordered(concurrency);

        while let Some((url, result)) = fetches.next().await {
            stats.requested += 1;
            match result {
                Ok(doc) if doc.status == 200 => {
                    stats.documents += 1;
                    if let Some(final_url) = admit(&doc.url, host) {
                        seen.insert(final_url);
                    }
                    for directive in session.handle(&doc) {
                        if let Some(next) = admit(&directive.url, host) {
                            if seen.insert(next.clone()) {
                                frontier.push(next);
                            }
                        }
                    }
                }
                Ok(doc) => {
                    stats.failures += 1;
                    log::warn!("Skipping {}: status {}", url, doc.status);
                }
                Err(e) => {
                    stats.failures += 1;
                    log::warn!("Failed to fetch {}: {}", url, e);
                }
            }

            if delay.as_millis() > 0 {
                tokio::time::sleep(delay).await;
            }
        }
    }

    stats
}

/// Normalized URL if it may be fetched within this crawl.
fn admit(url: &str, host: &str) -> Option<String> {
    let mut url = Url::parse(url).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if !url.host_str()?.eq_ignore_ascii_case(host) {
        return None;
    }
    url.set_fragment(None);
    Some(url.into())
}
