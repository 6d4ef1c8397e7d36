//! Static site writer.
//!
//! ## Site Layout
//!
//! ```text
//! {root}/
//! ├── _data/
//! │   └── menu.json         # Navigation menu
//! ├── index.html            # One file per canonical page path
//! └── Documents/
//!     └── index.html
//! ```
//!
//! Pages carry a YAML front matter block followed by the sanitized body.
//! Page paths that would resolve outside the root are refused.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Menu, PageAggregate, TableRow};
use crate::services::paths::is_document_path;

/// Relative location of the menu sidecar.
pub const MENU_FILE: &str = "_data/menu.json";

/// Output sink for the generated site.
#[async_trait]
pub trait SiteStorage: Send + Sync {
    /// Write a merged page; returns the relative file it was stored at.
    async fn write_page(&self, page: &PageAggregate) -> Result<String>;

    /// Write the navigation menu sidecar.
    async fn write_menu(&self, menu: &Menu) -> Result<()>;
}

/// Local filesystem site.
#[derive(Debug, Clone)]
pub struct LocalSite {
    root_dir: PathBuf,
    base_url: Url,
}

impl LocalSite {
    /// Create a site rooted at `root_dir`; document rows link to `base_url`.
    pub fn new(root_dir: impl Into<PathBuf>, base_url: &str) -> Result<Self> {
        Ok(Self {
            root_dir: root_dir.into(),
            base_url: Url::parse(base_url)?,
        })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key.trim_start_matches('/'))
    }

    /// Write a whole file, creating parent directories first.
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl SiteStorage for LocalSite {
    async fn write_page(&self, page: &PageAggregate) -> Result<String> {
        let key = page_file(&page.path).ok_or_else(|| {
            AppError::validation(format!("Page path {} leaves the site root", page.path))
        })?;
        let content = render_page(page, &self.base_url)?;
        self.write_bytes(&key, content.as_bytes()).await?;
        log::debug!("Wrote {} ({} rows)", key, page.rows.len());
        Ok(key)
    }

    async fn write_menu(&self, menu: &Menu) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&menu.items)?;
        self.write_bytes(MENU_FILE, &bytes).await?;
        log::info!("Wrote menu with {} items", menu.items.len());
        Ok(())
    }
}

/// Relative file a page path is stored at; `None` if it would leave the root.
pub fn page_file(path: &str) -> Option<String> {
    let path = path.trim_start_matches('/');
    let contained = Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !contained {
        return None;
    }

    let file = if path.is_empty() {
        "index.html".to_string()
    } else if path.ends_with("/index.html") || path == "index.html" {
        path.to_string()
    } else if path.ends_with('/') {
        format!("{path}index.html")
    } else {
        format!("{path}/index.html")
    };
    Some(file)
}

#[derive(Serialize)]
struct FrontMatter<'a> {
    title: Option<&'a str>,
    breadcrumbs: Option<&'a str>,
    layout: &'static str,
    original_url: &'a str,
    form_table_rows: Vec<RowOut<'a>>,
}

#[derive(Serialize)]
struct RowOut<'a> {
    label: &'a str,
    path: String,
    user: &'a str,
    modified_date: &'a str,
}

impl<'a> RowOut<'a> {
    fn new(row: &'a TableRow, base_url: &Url) -> Self {
        // Documents link straight to the upstream copy.
        let path = if is_document_path(&row.path) {
            base_url
                .join(&row.path)
                .map(String::from)
                .unwrap_or_else(|_| row.path.clone())
        } else {
            row.path.clone()
        };
        Self {
            label: &row.label,
            path,
            user: &row.user,
            modified_date: &row.modified_date,
        }
    }
}

/// Render a page: front matter followed by the body.
pub fn render_page(page: &PageAggregate, base_url: &Url) -> Result<String> {
    let front_matter = FrontMatter {
        title: page.title.as_deref(),
        breadcrumbs: page.breadcrumbs.as_deref(),
        layout: if page.is_listing() { "listing" } else { "page" },
        original_url: &page.original_url,
        form_table_rows: page
            .rows
            .iter()
            .map(|row| RowOut::new(row, base_url))
            .collect(),
    };

    let mut out = String::from("---\n");
    out.push_str(&serde_yaml::to_string(&front_matter)?);
    out.push_str("---\n");
    if let Some(body) = &page.body {
        out.push_str(body);
        out.push('\n');
    }
    Ok(out)
}
