// src/models/selectors.rs

//! Compiled CSS selectors for the upstream CMS markup.

use scraper::Selector;

use crate::error::{AppError, Result};
use crate::models::SelectorConfig;

/// Parsed form of [`SelectorConfig`], built once per crawl.
#[derive(Debug, Clone)]
pub struct CmsSelectors {
    pub form_table: Selector,
    pub simple_content: Selector,
    pub menu_links: Selector,
    pub title: Selector,
    pub row_title: Selector,
    pub row_link: Selector,
    pub row_user: Selector,
    pub row_modified: Selector,
    pub next_page: Selector,
    pub listing_breadcrumbs: Selector,
    pub content_breadcrumbs: Selector,
}

impl SelectorConfig {
    /// Parse every configured selector, failing on the first invalid one.
    pub fn compile(&self) -> Result<CmsSelectors> {
        Ok(CmsSelectors {
            form_table: parse_selector(&self.form_table)?,
            simple_content: parse_selector(&self.simple_content)?,
            menu_links: parse_selector(&self.menu_links)?,
            title: parse_selector(&self.title)?,
            row_title: parse_selector(&self.row_title)?,
            row_link: parse_selector(&self.row_link)?,
            row_user: parse_selector(&self.row_user)?,
            row_modified: parse_selector(&self.row_modified)?,
            next_page: parse_selector(&self.next_page)?,
            listing_breadcrumbs: parse_selector(&self.listing_breadcrumbs)?,
            content_breadcrumbs: parse_selector(&self.content_breadcrumbs)?,
        })
    }
}

impl Default for CmsSelectors {
    fn default() -> Self {
        // The built-in selector strings are constants and always parse.
        SelectorConfig::default()
            .compile()
            .unwrap_or_else(|e| unreachable!("default selectors are valid: {e}"))
    }
}

/// Parse a single CSS selector.
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
