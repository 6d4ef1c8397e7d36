// src/pipeline/archive.rs

//! Archive passes over discovered documents.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::archive::{ArchiveCoordinator, ArchiveReport, build_coordinators};
use crate::error::Result;
use crate::models::{Config, CrawlRecord, FileRecord};
use crate::services::HttpUpstream;

use super::build::load_items;

/// Run every coordinator over `files`, one backend after the other.
pub async fn archive_files(
    coordinators: &[ArchiveCoordinator],
    files: &[FileRecord],
    concurrency: usize,
) -> Vec<ArchiveReport> {
    let mut reports = Vec::with_capacity(coordinators.len());
    for coordinator in coordinators {
        log::info!(
            "[{}] Archiving {} documents",
            coordinator.name(),
            files.len()
        );
        let report = coordinator.archive_all(files, concurrency).await;
        log::info!(
            "[{}] uploaded {}, unchanged {}, skipped {}, failed {}",
            report.backend,
            report.uploaded,
            report.unchanged,
            report.skipped,
            report.failed
        );
        reports.push(report);
    }
    reports
}

/// Distinct file records of an export, in order of first appearance.
pub fn distinct_files(records: &[CrawlRecord]) -> Vec<FileRecord> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|record| match record {
            CrawlRecord::File(file) => Some(file),
            _ => None,
        })
        .filter(|file| seen.insert(file.resource_key().to_string()))
        .cloned()
        .collect()
}

/// Archive the documents of an item export with every configured backend.
pub async fn run_archive(config: &Config, items: impl AsRef<Path>) -> Result<Vec<ArchiveReport>> {
    let records = load_items(items).await?;
    let files = distinct_files(&records);

    let upstream = Arc::new(HttpUpstream::new(&config.crawler)?);
    let coordinators = build_coordinators(config, upstream).await?;
    if coordinators.is_empty() {
        log::warn!("No archive backends configured");
    }
    Ok(archive_files(&coordinators, &files, config.crawler.max_concurrent).await)
}
