//! Persistent state and output sinks.
//!
//! - ETag cache: `{cache_dir}/{namespace}/{hh}/{sha256}` - last archived
//!   upstream ETag per resource key
//! - Site: `{site_dir}/**/index.html` plus `_data/menu.json`

pub mod etag_cache;
pub mod site;

// Re-export for convenience
pub use etag_cache::{EtagCache, EtagStore, ScopedEtagCache};
pub use site::{LocalSite, MENU_FILE, SiteStorage};
