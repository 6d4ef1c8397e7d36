// src/models/mod.rs

//! Domain models for the mirror application.
//!
//! This module contains the data structures shared by extraction,
//! aggregation, archiving and site writing.

mod aggregate;
mod config;
mod record;
mod selectors;

// Re-export all public types
pub use aggregate::PageAggregate;
pub use config::{
    ArchiveConfig, Config, CrawlerConfig, InternetArchiveConfig, OutputConfig, S3Config,
    SelectorConfig, SiteConfig,
};
pub use record::{
    CrawlRecord, Extracted, FetchDirective, FetchedDocument, FileRecord, FollowReason, Menu,
    MenuItem, Page, TableRow,
};
pub use selectors::{CmsSelectors, parse_selector};
