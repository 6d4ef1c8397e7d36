// src/services/extractor.rs

//! Extraction engine.
//!
//! Turns one fetched CMS document into typed records and follow-up fetch
//! directives. Documents are either tabular folder listings or ordinary
//! content pages; exactly one of the two extractions runs per document.

use scraper::{ElementRef, Html};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{
    CmsSelectors, Config, CrawlRecord, Extracted, FetchDirective, FetchedDocument, FileRecord,
    FollowReason, Menu, MenuItem, Page, SiteConfig, TableRow,
};
use crate::services::markup;
use crate::services::paths::{
    IndexMarker, dedotnet, fix_forms_url, has_file_extension, is_document_path, is_forms_url,
    row_link_path, unquote,
};

/// Session state consulted while extracting a document.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionFlags {
    /// The navigation menu has not been scraped yet in this session
    pub scrape_menu: bool,
}

/// Records and directives extracted from one document, consumed once.
#[derive(Debug, Default)]
pub struct Extraction {
    items: std::vec::IntoIter<Extracted>,
}

impl Iterator for Extraction {
    type Item = Extracted;

    fn next(&mut self) -> Option<Extracted> {
        self.items.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl ExactSizeIterator for Extraction {}

/// Stateless extractor for one upstream site.
pub struct Extractor {
    selectors: CmsSelectors,
    host: String,
}

impl Extractor {
    /// Create an extractor for the site with the given compiled selectors.
    pub fn new(site: &SiteConfig, selectors: CmsSelectors) -> Result<Self> {
        let host = site
            .host()
            .ok_or_else(|| AppError::config(format!("No host in base URL {}", site.base_url)))?;
        Ok(Self { selectors, host })
    }

    /// Create an extractor from the application configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.site, config.selectors.compile()?)
    }

    /// Extract records and fetch directives from a document.
    ///
    /// Never fails: unusable fragments are skipped and logged.
    pub fn extract(&self, doc: &FetchedDocument, flags: SessionFlags) -> Extraction {
        let url = match Url::parse(&doc.url) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Skipping document with invalid URL {}: {}", doc.url, e);
                return Extraction::default();
            }
        };
        let html = Html::parse_document(&doc.body);
        let mut out = Vec::new();

        if flags.scrape_menu {
            self.extract_menu(&html, &url, &mut out);
        }

        let mut page = if html.select(&self.selectors.form_table).next().is_some() {
            self.extract_listing(&html, &url, &mut out)
        } else {
            self.extract_content(&html, &url, &mut out)
        };
        page.title = html
            .select(&self.selectors.title)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty());

        log::debug!(
            "Extracted {} ({} rows, {} items)",
            page.path,
            page.table_rows.len(),
            out.len() + 1
        );
        out.push(Extracted::Record(CrawlRecord::Page(page)));

        Extraction {
            items: out.into_iter(),
        }
    }

    fn extract_menu(&self, html: &Html, url: &Url, out: &mut Vec<Extracted>) {
        let mut items = Vec::new();
        for link in html.select(&self.selectors.menu_links) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            if href.contains("AllDocuments") {
                continue;
            }
            items.push(MenuItem {
                url: dedotnet(href, IndexMarker::TrailingSlash),
                text: element_text(link),
            });
            match url.join(href) {
                Ok(target) => out.push(follow(target, FollowReason::Menu)),
                Err(e) => log::debug!("Unresolvable menu link {href}: {e}"),
            }
        }
        log::info!("Scraped menu with {} items", items.len());
        out.push(Extracted::Record(CrawlRecord::Menu(Menu { items })));
    }

    fn extract_listing(&self, html: &Html, url: &Url, out: &mut Vec<Extracted>) -> Page {
        let page_url = if is_forms_url(url.as_str()) {
            fix_forms_url(url.as_str())
        } else {
            url.to_string()
        };
        let path = dedotnet(&decoded_path(&page_url), IndexMarker::TrailingSlash);

        let mut rows = Vec::new();
        for title_cell in html.select(&self.selectors.row_title) {
            let Some(row) = title_cell
                .parent()
                .and_then(|cell| cell.parent())
                .and_then(ElementRef::wrap)
            else {
                continue;
            };
            let Some(row) = self.parse_row(row) else {
                log::debug!("Skipping unparseable row on {}", url);
                continue;
            };

            match url.join(&row.path) {
                Ok(target) if is_document_path(&row.path) => {
                    out.push(Extracted::Record(CrawlRecord::File(FileRecord {
                        original_url: target.to_string(),
                        path: row.path.clone(),
                    })));
                }
                Ok(target) => out.push(follow(target, FollowReason::Child)),
                Err(e) => log::debug!("Unresolvable row link {}: {}", row.path, e),
            }
            rows.push(row);
        }

        if html.select(&self.selectors.next_page).next().is_some() {
            if let Some(last) = rows.last() {
                out.push(follow(
                    continuation_url(url, &last.label),
                    FollowReason::Continuation,
                ));
            }
        }

        let breadcrumbs = html
            .select(&self.selectors.listing_breadcrumbs)
            .next()
            .and_then(|crumbs| self.breadcrumbs_html(crumbs, url));

        Page {
            original_url: page_url,
            path,
            breadcrumbs,
            table_rows: rows,
            ..Page::default()
        }
    }

    fn parse_row(&self, row: ElementRef<'_>) -> Option<TableRow> {
        let link = row.select(&self.selectors.row_link).next()?;
        let href = link.value().attr("href")?;
        let modified_date = element_text(row.select(&self.selectors.row_modified).next()?);
        let user = row
            .select(&self.selectors.row_user)
            .flat_map(|cell| cell.text())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Some(TableRow {
            label: element_text(link),
            path: row_link_path(href),
            user,
            modified_date,
        })
    }

    fn extract_content(&self, html: &Html, url: &Url, out: &mut Vec<Extracted>) -> Page {
        let body = html
            .select(&self.selectors.simple_content)
            .next()
            .and_then(|region| {
                let body = markup::sanitize(region, |href| self.rewrite_content_link(href, url, out));
                sanitized(body, "content", url)
            });

        let breadcrumbs = html
            .select(&self.selectors.content_breadcrumbs)
            .next()
            .and_then(|crumbs| self.breadcrumbs_html(crumbs, url));

        Page {
            original_url: url.to_string(),
            path: dedotnet(&unquote(url.path()), IndexMarker::IndexHtml),
            breadcrumbs,
            body,
            ..Page::default()
        }
    }

    /// Decide what happens to one anchor in page content.
    fn rewrite_content_link(
        &self,
        href: &str,
        doc_url: &Url,
        out: &mut Vec<Extracted>,
    ) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return None;
        }
        let target = if is_forms_url(href) {
            fix_forms_url(href)
        } else {
            href.to_string()
        };

        let explicit_host = match Url::parse(&target) {
            // mailto:, javascript: and friends pass through untouched
            Ok(parsed) if !matches!(parsed.scheme(), "http" | "https") => return None,
            Ok(parsed) => parsed.host_str().map(str::to_string),
            Err(_) => None,
        };
        if !explicit_host
            .as_deref()
            .is_none_or(|host| host.eq_ignore_ascii_case(&self.host))
        {
            return None;
        }

        let mut absolute = doc_url.join(&target).ok()?;
        absolute.set_fragment(None);
        let path = unquote(absolute.path());

        if has_file_extension(&path) && !path.to_ascii_lowercase().ends_with(".aspx") {
            out.push(Extracted::Record(CrawlRecord::File(FileRecord {
                original_url: absolute.to_string(),
                path,
            })));
            return Some(absolute.to_string());
        }
        if target.contains("Authenticate") {
            return None;
        }

        let rewritten = dedotnet(&path, IndexMarker::IndexHtml);
        out.push(follow(absolute, FollowReason::Link));
        Some(rewritten)
    }

    fn breadcrumbs_html(&self, crumbs: ElementRef<'_>, doc_url: &Url) -> Option<String> {
        let html = markup::sanitize(crumbs, |href| {
            let target = if is_forms_url(href) {
                fix_forms_url(href)
            } else {
                href.to_string()
            };
            let absolute = doc_url.join(&target).ok()?;
            let same_origin = absolute
                .host_str()
                .is_some_and(|host| host.eq_ignore_ascii_case(&self.host));
            same_origin.then(|| dedotnet(&unquote(absolute.path()), IndexMarker::TrailingSlash))
        });
        sanitized(html, "breadcrumbs", doc_url)
    }
}

/// Keep a sanitized fragment, dropping it with a warning when rewriting failed.
fn sanitized(html: Result<String>, what: &str, url: &Url) -> Option<String> {
    match html {
        Ok(html) => Some(html),
        Err(e) => {
            log::warn!("Dropping {} of {}: {}", what, url, e);
            None
        }
    }
}

/// URL of the next page of a listing, following the CMS pager's query
/// contract: the folder being listed plus the label of the last row shown.
fn continuation_url(url: &Url, last_label: &str) -> Url {
    let root_folder = url
        .query_pairs()
        .find(|(k, _)| k == "RootFolder")
        .map(|(_, v)| v.into_owned());

    let mut next = url.clone();
    next.set_fragment(None);
    {
        let mut query = next.query_pairs_mut();
        query.clear();
        if let Some(folder) = &root_folder {
            query.append_pair("RootFolder", folder);
        }
        query.append_pair("p_FileLeafRef", last_label);
        query.append_pair("Paged", "TRUE");
    }
    next
}

fn follow(url: Url, reason: FollowReason) -> Extracted {
    Extracted::Follow(FetchDirective::new(url, reason))
}

fn decoded_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => unquote(parsed.path()),
        Err(_) => url.to_string(),
    }
}

/// Text content of an element with whitespace collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
