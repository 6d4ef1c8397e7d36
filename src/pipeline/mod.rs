//! Pipeline entry points for mirror operations.
//!
//! - `run_crawl`: Crawl the site, write the mirror and archive documents
//! - `run_build`: Build the mirror from an item export
//! - `run_archive`: Archive the documents of an item export

pub mod archive;
pub mod build;
pub mod crawl;
pub mod depaginate;
pub mod session;

pub use archive::{archive_files, distinct_files, run_archive};
pub use build::{SiteReport, assemble, load_items, run_build, save_items, write_site};
pub use crawl::{CrawlOptions, CrawlSummary, FetchStats, run_crawl};
pub use depaginate::{Depaginator, MergeStatus, depaginate};
pub use session::{CrawlSession, SessionOutput};
