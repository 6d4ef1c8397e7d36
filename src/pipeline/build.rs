// src/pipeline/build.rs

//! Site generation from merged pages, live or from an item export.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, CrawlRecord, Menu, PageAggregate};
use crate::storage::{LocalSite, SiteStorage};

use super::depaginate::depaginate;

/// Totals of a site write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteReport {
    pub pages: usize,
    pub menu_items: usize,
    /// Pages refused by the site, such as paths leaving its root
    pub skipped: usize,
}

/// Write the menu (if any) and every page to the site.
pub async fn write_site(
    site: &dyn SiteStorage,
    menu: Option<&Menu>,
    pages: &[PageAggregate],
) -> Result<SiteReport> {
    let mut report = SiteReport::default();
    match menu {
        Some(menu) => {
            site.write_menu(menu).await?;
            report.menu_items = menu.items.len();
        }
        None => log::warn!("No menu was scraped; menu file not written"),
    }
    for page in pages {
        match site.write_page(page).await {
            Ok(_) => report.pages += 1,
            Err(AppError::Validation(reason)) => {
                log::warn!("Skipping page {}: {}", page.original_url, reason);
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    log::info!("Wrote {} pages ({} skipped)", report.pages, report.skipped);
    Ok(report)
}

/// Read an item export.
pub async fn load_items(path: impl AsRef<Path>) -> Result<Vec<CrawlRecord>> {
    let content = tokio::fs::read(path.as_ref()).await?;
    Ok(serde_json::from_slice(&content)?)
}

/// Write an item export as a JSON array.
pub async fn save_items(path: impl AsRef<Path>, records: &[CrawlRecord]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(records)?;
    tokio::fs::write(path, json).await?;
    log::info!("Exported {} items to {}", records.len(), path.display());
    Ok(())
}

/// Split an export into its first menu and merged pages.
pub fn assemble(records: Vec<CrawlRecord>) -> (Option<Menu>, Vec<PageAggregate>) {
    let mut menu = None;
    let mut pages = Vec::new();
    for record in records {
        match record {
            CrawlRecord::Menu(m) => {
                if menu.is_none() {
                    menu = Some(m);
                }
            }
            CrawlRecord::Page(page) => pages.push(page),
            CrawlRecord::File(_) => {}
        }
    }
    (menu, depaginate(pages))
}

/// Build the site from an item export.
pub async fn run_build(config: &Config, items: impl AsRef<Path>) -> Result<SiteReport> {
    let records = load_items(items.as_ref()).await?;
    log::info!(
        "Building site from {} items in {}",
        records.len(),
        items.as_ref().display()
    );
    let (menu, pages) = assemble(records);

    let site = LocalSite::new(&config.output.site_dir, &config.site.base_url)?;
    write_site(&site, menu.as_ref(), &pages).await
}
