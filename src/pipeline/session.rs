// src/pipeline/session.rs

//! One crawl session: extraction plus the state it accumulates.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::models::{
    CrawlRecord, Extracted, FetchDirective, FetchedDocument, FileRecord, Menu, PageAggregate,
};
use crate::services::{Extractor, SessionFlags};

use super::depaginate::Depaginator;

/// Everything a finished session produced.
#[derive(Debug, Default)]
pub struct SessionOutput {
    pub menu: Option<Menu>,
    /// Merged pages ordered by path
    pub pages: Vec<PageAggregate>,
    /// Distinct documents in discovery order
    pub files: Vec<FileRecord>,
    /// Every record in emission order, when recording is enabled
    pub records: Vec<CrawlRecord>,
}

#[derive(Debug, Default)]
struct Collected {
    menu: Option<Menu>,
    files: Vec<FileRecord>,
    file_keys: HashSet<String>,
    records: Vec<CrawlRecord>,
}

/// Routes extracted records to their consumers for one crawl.
pub struct CrawlSession {
    extractor: Extractor,
    depaginator: Depaginator,
    menu_pending: AtomicBool,
    record_items: bool,
    collected: Mutex<Collected>,
}

impl CrawlSession {
    /// Start a session; `scrape_menu` arms the one-shot menu scrape.
    pub fn new(extractor: Extractor, scrape_menu: bool, record_items: bool) -> Self {
        Self {
            extractor,
            depaginator: Depaginator::new(),
            menu_pending: AtomicBool::new(scrape_menu),
            record_items,
            collected: Mutex::new(Collected::default()),
        }
    }

    /// Extract one document and return the fetches it asks for.
    pub fn handle(&self, doc: &FetchedDocument) -> Vec<FetchDirective> {
        let flags = SessionFlags {
            scrape_menu: self.menu_pending.swap(false, Ordering::AcqRel),
        };

        let mut directives = Vec::new();
        for item in self.extractor.extract(doc, flags) {
            match item {
                Extracted::Follow(directive) => directives.push(directive),
                Extracted::Record(record) => self.accept(record),
            }
        }
        directives
    }

    fn accept(&self, record: CrawlRecord) {
        let mut collected = self.collected.lock().unwrap_or_else(PoisonError::into_inner);
        if self.record_items {
            collected.records.push(record.clone());
        }

        match record {
            CrawlRecord::Menu(menu) => {
                if collected.menu.is_none() {
                    collected.menu = Some(menu);
                }
            }
            CrawlRecord::Page(page) => {
                let path = page.path.clone();
                let status = self.depaginator.absorb(page);
                if status.emissions > 1 {
                    log::debug!(
                        "Merged page {} ({} rows over {} fetches)",
                        path,
                        status.rows,
                        status.emissions
                    );
                }
            }
            CrawlRecord::File(file) => {
                if collected.file_keys.insert(file.path.clone()) {
                    collected.files.push(file);
                }
            }
        }
    }

    /// Pages merged so far.
    pub fn page_count(&self) -> usize {
        self.depaginator.len()
    }

    /// End the session and flush its state.
    pub fn finish(self) -> SessionOutput {
        let collected = self
            .collected
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        SessionOutput {
            menu: collected.menu,
            pages: self.depaginator.finish(),
            files: collected.files,
            records: collected.records,
        }
    }
}
