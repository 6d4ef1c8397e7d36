//! Merged view of a page crawled across several paginated fetches.

use serde::{Deserialize, Serialize};

use super::record::{Page, TableRow};

/// All emissions of one canonical path merged together.
///
/// Scalar fields hold the latest emission; rows accumulate in arrival order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageAggregate {
    pub original_url: String,
    pub path: String,
    pub title: Option<String>,
    pub breadcrumbs: Option<String>,
    pub body: Option<String>,
    #[serde(rename = "form_table_rows")]
    pub rows: Vec<TableRow>,
    /// Number of page records merged into this aggregate
    #[serde(skip)]
    pub emissions: usize,
}

impl PageAggregate {
    /// Merge another emission of the same path.
    ///
    /// Rows are appended without de-duplication, so re-crawling a page in one
    /// session repeats its rows.
    pub fn absorb(&mut self, page: Page) {
        debug_assert_eq!(self.path, page.path);
        self.original_url = page.original_url;
        self.title = page.title;
        self.breadcrumbs = page.breadcrumbs;
        self.body = page.body;
        self.rows.extend(page.table_rows);
        self.emissions += 1;
    }

    /// Whether this page is a tabular document listing.
    pub fn is_listing(&self) -> bool {
        !self.rows.is_empty()
    }
}

impl From<Page> for PageAggregate {
    fn from(page: Page) -> Self {
        Self {
            original_url: page.original_url,
            path: page.path,
            title: page.title,
            breadcrumbs: page.breadcrumbs,
            body: page.body,
            rows: page.table_rows,
            emissions: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(label: &str) -> TableRow {
        TableRow {
            label: label.to_string(),
            path: format!("/Documents/{label}.pdf"),
            user: "Jane Doe".to_string(),
            modified_date: "2019/05/02".to_string(),
        }
    }

    #[test]
    fn test_absorb_overwrites_scalars_and_appends_rows() {
        let mut aggregate = PageAggregate::from(Page {
            original_url: "http://example.com/a".to_string(),
            path: "/Documents/".to_string(),
            title: Some("First".to_string()),
            table_rows: vec![row("a")],
            ..Page::default()
        });
        aggregate.absorb(Page {
            original_url: "http://example.com/b".to_string(),
            path: "/Documents/".to_string(),
            title: None,
            table_rows: vec![row("b")],
            ..Page::default()
        });

        assert_eq!(aggregate.original_url, "http://example.com/b");
        assert_eq!(aggregate.title, None);
        assert_eq!(aggregate.rows, vec![row("a"), row("b")]);
        assert_eq!(aggregate.emissions, 2);
        assert!(aggregate.is_listing());
    }
}
