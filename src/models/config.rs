//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Upstream site description
    #[serde(default)]
    pub site: SiteConfig,

    /// CSS selectors for the upstream CMS markup
    #[serde(default)]
    pub selectors: SelectorConfig,

    /// Output locations
    #[serde(default)]
    pub output: OutputConfig,

    /// Archive backends; each is enabled by its presence
    #[serde(default)]
    pub archive: ArchiveConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        let base = url::Url::parse(&self.site.base_url)
            .map_err(|e| AppError::validation(format!("site.base_url: {e}")))?;
        if base.host_str().is_none() {
            return Err(AppError::validation("site.base_url has no host"));
        }
        if self.site.start_urls.is_empty() {
            return Err(AppError::validation("No start URLs defined"));
        }
        if let Some(s3) = &self.archive.s3 {
            if s3.bucket.trim().is_empty() {
                return Err(AppError::validation("archive.s3.bucket is empty"));
            }
        }
        if let Some(ia) = &self.archive.internet_archive {
            if ia.access_key.is_empty() || ia.secret_key.is_empty() {
                return Err(AppError::validation(
                    "archive.internet_archive requires access_key and secret_key",
                ));
            }
        }
        self.selectors.compile().map(|_| ())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum concurrent requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// The upstream site being mirrored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Origin of the upstream CMS, without a trailing slash
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Where the crawl starts
    #[serde(default = "defaults::start_urls")]
    pub start_urls: Vec<String>,

    /// Scrape the navigation menu from the first document
    #[serde(default = "defaults::enabled")]
    pub scrape_menu: bool,
}

impl SiteConfig {
    /// Host name of the upstream origin.
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            start_urls: defaults::start_urls(),
            scrape_menu: true,
        }
    }
}

/// CSS selectors describing the upstream CMS markup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Present only on tabular document listings
    #[serde(default = "defaults::form_table")]
    pub form_table: String,

    /// Main content region of ordinary pages
    #[serde(default = "defaults::simple_content")]
    pub simple_content: String,

    /// Quick launch navigation links
    #[serde(default = "defaults::menu_links")]
    pub menu_links: String,

    #[serde(default = "defaults::title")]
    pub title: String,

    /// Title cell of a listing row; the row is its grandparent
    #[serde(default = "defaults::row_title")]
    pub row_title: String,

    /// Anchor holding the row label and link
    #[serde(default = "defaults::row_link")]
    pub row_link: String,

    #[serde(default = "defaults::row_user")]
    pub row_user: String,

    #[serde(default = "defaults::row_modified")]
    pub row_modified: String,

    /// Pager control linking to the next page of a listing
    #[serde(default = "defaults::next_page")]
    pub next_page: String,

    /// Breadcrumb container on listing pages
    #[serde(default = "defaults::listing_breadcrumbs")]
    pub listing_breadcrumbs: String,

    /// Breadcrumb container on ordinary pages
    #[serde(default = "defaults::content_breadcrumbs")]
    pub content_breadcrumbs: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            form_table: defaults::form_table(),
            simple_content: defaults::simple_content(),
            menu_links: defaults::menu_links(),
            title: defaults::title(),
            row_title: defaults::row_title(),
            row_link: defaults::row_link(),
            row_user: defaults::row_user(),
            row_modified: defaults::row_modified(),
            next_page: defaults::next_page(),
            listing_breadcrumbs: defaults::listing_breadcrumbs(),
            content_breadcrumbs: defaults::content_breadcrumbs(),
        }
    }
}

/// Where artifacts are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root of the generated static site
    #[serde(default = "defaults::site_dir")]
    pub site_dir: PathBuf,

    /// Root of the ETag cache
    #[serde(default = "defaults::cache_dir")]
    pub cache_dir: PathBuf,

    /// Optional JSON export of every emitted record
    #[serde(default)]
    pub items_file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            site_dir: defaults::site_dir(),
            cache_dir: defaults::cache_dir(),
            items_file: None,
        }
    }
}

/// Archive backend settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub s3: Option<S3Config>,

    #[serde(default)]
    pub internet_archive: Option<InternetArchiveConfig>,
}

/// Shared object-store bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
}

/// Write-once archive with one bucket per document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternetArchiveConfig {
    /// S3-compatible endpoint
    #[serde(default = "defaults::ia_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub access_key: String,

    #[serde(default)]
    pub secret_key: String,

    #[serde(default = "defaults::ia_collection")]
    pub collection: String,

    #[serde(default = "defaults::ia_mediatype")]
    pub mediatype: String,

    #[serde(default = "defaults::ia_publisher")]
    pub publisher: String,

    #[serde(default = "defaults::base_url")]
    pub license_url: String,

    #[serde(default = "defaults::ia_rights")]
    pub rights: String,

    /// Subject keywords, `;`-separated
    #[serde(default = "defaults::ia_keywords")]
    pub keywords: String,
}

impl Default for InternetArchiveConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::ia_endpoint(),
            access_key: String::new(),
            secret_key: String::new(),
            collection: defaults::ia_collection(),
            mediatype: defaults::ia_mediatype(),
            publisher: defaults::ia_publisher(),
            license_url: defaults::base_url(),
            rights: defaults::ia_rights(),
            keywords: defaults::ia_keywords(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; cms-mirror/0.1)".into()
    }
    pub fn timeout() -> u64 {
        60
    }
    pub fn request_delay() -> u64 {
        0
    }
    pub fn max_concurrent() -> usize {
        8
    }
    pub fn enabled() -> bool {
        true
    }

    // Site defaults
    pub fn base_url() -> String {
        "http://mfma.treasury.gov.za".into()
    }
    pub fn start_urls() -> Vec<String> {
        vec!["http://mfma.treasury.gov.za".into()]
    }

    // Selector defaults
    pub fn form_table() -> String {
        "div.mainContent td#MSOZoneCell_WebPartWPQ2".into()
    }
    pub fn simple_content() -> String {
        ".mainContent".into()
    }
    pub fn menu_links() -> String {
        "#zz1_QuickLaunchMenu a".into()
    }
    pub fn title() -> String {
        ".breadcrumbCurrent".into()
    }
    pub fn row_title() -> String {
        ".ms-vb-title .ms-unselectedtitle".into()
    }
    pub fn row_link() -> String {
        "tr td a".into()
    }
    pub fn row_user() -> String {
        ".ms-vb-user".into()
    }
    pub fn row_modified() -> String {
        "td.ms-vb2 nobr".into()
    }
    pub fn next_page() -> String {
        r#"img[alt="Next"]"#.into()
    }
    pub fn listing_breadcrumbs() -> String {
        "#ctl00_PlaceHolderTitleBreadcrumb_ContentMap".into()
    }
    pub fn content_breadcrumbs() -> String {
        "#ctl00_PlaceHolderTitleBreadcrumb_siteMapPath".into()
    }

    // Output defaults
    pub fn site_dir() -> PathBuf {
        PathBuf::from("mirror/site")
    }
    pub fn cache_dir() -> PathBuf {
        PathBuf::from("mirror/cache")
    }

    // Internet Archive defaults
    pub fn ia_endpoint() -> String {
        "http://s3.us.archive.org".into()
    }
    pub fn ia_collection() -> String {
        "mfmasouthafrica".into()
    }
    pub fn ia_mediatype() -> String {
        "text".into()
    }
    pub fn ia_publisher() -> String {
        "National Treasury, Republic of South Africa".into()
    }
    pub fn ia_rights() -> String {
        "These National Treasury publications may not be reproduced wholly or in part \
         without the express authorisation of the National Treasury in writing unless \
         used for non-profit purposes."
            .into()
    }
    pub fn ia_keywords() -> String {
        "Local Government;MFMA;Municipal Financial Management Act;Finance;Governance;\
         Management;National;Local;Government;Planning;South Africa;Provincial"
            .into()
    }
}
