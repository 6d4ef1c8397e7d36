//! Records emitted by the extraction engine.
//!
//! Every `path` carried by a record is already in canonical output-path
//! space. Upstream URLs only ever appear in `original_url`.

use serde::{Deserialize, Serialize};

/// One typed record produced while crawling.
///
/// Serialized with a `type` tag so an export can be read back by `build`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrawlRecord {
    Menu(Menu),
    Page(Page),
    File(FileRecord),
}

/// The site navigation menu, scraped once per session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Menu {
    #[serde(rename = "menu_items")]
    pub items: Vec<MenuItem>,
}

/// A single menu link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MenuItem {
    pub url: String,
    pub text: String,
}

/// One fetched page, possibly only a partial listing of a paginated page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    /// Upstream URL the page was fetched from
    pub original_url: String,

    /// Canonical output path
    pub path: String,

    #[serde(default)]
    pub title: Option<String>,

    /// Sanitized breadcrumb markup with rewritten links
    #[serde(default)]
    pub breadcrumbs: Option<String>,

    /// Sanitized main content markup
    #[serde(default)]
    pub body: Option<String>,

    /// Rows of a tabular listing, in document order
    #[serde(default, rename = "form_table_rows")]
    pub table_rows: Vec<TableRow>,
}

/// A row of a tabular document listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableRow {
    pub label: String,
    pub path: String,
    pub user: String,
    pub modified_date: String,
}

/// A binary document that should be archived.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FileRecord {
    /// Absolute upstream URL of the document
    pub original_url: String,

    /// Decoded canonical path; doubles as the resource key
    pub path: String,
}

impl FileRecord {
    /// The backend-independent key identifying this artifact.
    pub fn resource_key(&self) -> &str {
        &self.path
    }
}

/// Why a fetch directive was emitted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FollowReason {
    /// Link found in the navigation menu
    Menu,
    /// Child folder or page of a tabular listing
    Child,
    /// Next page of a paginated listing
    Continuation,
    /// Same-origin link in page content
    Link,
}

/// A request the crawling engine should schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchDirective {
    /// Absolute URL
    pub url: String,
    pub reason: FollowReason,
}

impl FetchDirective {
    pub fn new(url: impl Into<String>, reason: FollowReason) -> Self {
        Self {
            url: url.into(),
            reason,
        }
    }
}

/// Output of extracting one document: either a record or a follow-up fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Record(CrawlRecord),
    Follow(FetchDirective),
}

/// A document delivered by the crawling engine.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl FetchedDocument {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_with_type_tag() {
        let record = CrawlRecord::File(FileRecord {
            original_url: "http://example.com/Documents/a.pdf".to_string(),
            path: "/Documents/a.pdf".to_string(),
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["path"], "/Documents/a.pdf");
    }

    #[test]
    fn test_page_reads_export_field_names() {
        let json = r#"{
            "type": "page",
            "original_url": "http://example.com/Documents/Forms/AllItems.aspx",
            "path": "/Documents/",
            "form_table_rows": [
                {"label": "a", "path": "/Documents/a.pdf", "user": "x", "modified_date": "1/1/2020"}
            ]
        }"#;
        let record: CrawlRecord = serde_json::from_str(json).unwrap();
        match record {
            CrawlRecord::Page(page) => {
                assert_eq!(page.table_rows.len(), 1);
                assert!(page.title.is_none());
            }
            other => panic!("expected page, got {other:?}"),
        }
    }

    #[test]
    fn test_menu_uses_menu_items_key() {
        let menu = Menu {
            items: vec![MenuItem {
                url: "/Pages/".to_string(),
                text: "Home".to_string(),
            }],
        };
        let json = serde_json::to_value(CrawlRecord::Menu(menu)).unwrap();
        assert_eq!(json["menu_items"][0]["text"], "Home");
    }
}
