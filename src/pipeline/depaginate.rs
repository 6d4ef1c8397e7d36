// src/pipeline/depaginate.rs

//! Session-scoped depagination aggregator.
//!
//! A paginated listing arrives as several page records for one canonical
//! path. The aggregator merges them; it is created with a crawl session and
//! consumed by `finish` when the session ends.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, PoisonError};

use crate::models::{Page, PageAggregate};

/// Size of an aggregate right after a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeStatus {
    pub rows: usize,
    pub emissions: usize,
}

/// Merges page records by canonical path.
#[derive(Debug, Default)]
pub struct Depaginator {
    pages: Mutex<HashMap<String, PageAggregate>>,
}

impl Depaginator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a page record.
    ///
    /// Calls for the same path are serialized, so rows keep arrival order.
    pub fn absorb(&self, page: Page) -> MergeStatus {
        let mut pages = self.pages.lock().unwrap_or_else(PoisonError::into_inner);
        let aggregate = match pages.entry(page.path.clone()) {
            Entry::Occupied(entry) => {
                let aggregate = entry.into_mut();
                aggregate.absorb(page);
                aggregate
            }
            Entry::Vacant(entry) => entry.insert(PageAggregate::from(page)),
        };
        MergeStatus {
            rows: aggregate.rows.len(),
            emissions: aggregate.emissions,
        }
    }

    /// Number of distinct paths seen so far.
    pub fn len(&self) -> usize {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// End the session, returning every aggregate ordered by path.
    pub fn finish(self) -> Vec<PageAggregate> {
        let pages = self
            .pages
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let mut pages: Vec<PageAggregate> = pages.into_values().collect();
        pages.sort_by(|a, b| a.path.cmp(&b.path));
        pages
    }
}

/// Merge a finite sequence of pages in one go.
pub fn depaginate(pages: impl IntoIterator<Item = Page>) -> Vec<PageAggregate> {
    let depaginator = Depaginator::new();
    for page in pages {
        depaginator.absorb(page);
    }
    depaginator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TableRow;
    use std::sync::Arc;

    fn row(n: usize) -> TableRow {
        TableRow {
            label: format!("r{n}"),
            path: format!("/Documents/r{n}.pdf"),
            user: "Jane Doe".to_string(),
            modified_date: "2019/05/02".to_string(),
        }
    }

    fn page(path: &str, rows: std::ops::RangeInclusive<usize>) -> Page {
        Page {
            original_url: format!("http://example.com{path}"),
            path: path.to_string(),
            table_rows: rows.map(row).collect(),
            ..Page::default()
        }
    }

    #[test]
    fn test_paginated_rows_are_concatenated_in_order() {
        let depaginator = Depaginator::new();
        depaginator.absorb(page("/Documents/", 1..=7));
        let status = depaginator.absorb(page("/Documents/", 8..=10));
        assert_eq!(status, MergeStatus { rows: 10, emissions: 2 });

        let expected: Vec<TableRow> = (1..=10).map(row).collect();

        let pages = depaginator.finish();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].rows, expected);
    }

    #[test]
    fn test_scalars_are_last_write_wins() {
        let depaginator = Depaginator::new();
        let mut first = page("/Documents/", 1..=1);
        first.title = Some("Old".to_string());
        let mut second = page("/Documents/", 2..=2);
        second.title = Some("New".to_string());
        second.original_url = "http://example.com/Documents/?Paged=TRUE".to_string();

        depaginator.absorb(first);
        depaginator.absorb(second);
        let merged = depaginator.finish().remove(0);
        assert_eq!(merged.title.as_deref(), Some("New"));
        assert_eq!(merged.original_url, "http://example.com/Documents/?Paged=TRUE");
    }

    #[test]
    fn test_recrawl_duplicates_rows() {
        let pages = depaginate([page("/Documents/", 1..=2), page("/Documents/", 1..=2)]);
        assert_eq!(pages[0].rows.len(), 4);
        assert_eq!(pages[0].emissions, 2);
    }

    #[test]
    fn test_paths_are_independent() {
        let pages = depaginate([
            page("/b/", 1..=1),
            page("/a/", 2..=2),
            page("/b/", 3..=3),
        ]);
        let paths: Vec<&str> = pages.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["/a/", "/b/"]);
        assert_eq!(pages[1].rows, vec![row(1), row(3)]);
    }

    #[test]
    fn test_concurrent_paths() {
        let depaginator = Arc::new(Depaginator::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let depaginator = Arc::clone(&depaginator);
                std::thread::spawn(move || {
                    for n in 0..10 {
                        depaginator.absorb(page(&format!("/p{i}/"), n..=n));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(depaginator.len(), 8);
        let depaginator = Arc::try_unwrap(depaginator).unwrap();
        for aggregate in depaginator.finish() {
            let labels: Vec<String> = aggregate.rows.iter().map(|r| r.label.clone()).collect();
            let expected: Vec<String> = (0..10).map(|n| format!("r{n}")).collect();
            assert_eq!(labels, expected);
        }
    }
}
