//! Archive upload coordinator.
//!
//! Copies upstream documents into durable storage without re-uploading
//! unchanged content. One coordinator runs per backend; all of them share the
//! same conditional protocol:
//!
//! 1. Resolve the backend target for the resource key.
//! 2. Take the expected ETag from the cache, or ask the backend on a miss.
//! 3. Fetch upstream with `If-None-Match`; `304` ends the item.
//! 4. Ensure the backend container exists (write-once backend only).
//! 5. Upload with metadata, then record the new ETag.
//!
//! Every failure is fatal for its item only.

pub mod internet_archive;
#[cfg(feature = "s3")]
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use thiserror::Error;

use crate::error::{AppError, Result};
use crate::models::{Config, FileRecord};
use crate::services::{Upstream, UpstreamResponse};
use crate::storage::{EtagCache, EtagStore};

pub use internet_archive::InternetArchiveBackend;
#[cfg(feature = "s3")]
pub use s3::S3Backend;

/// Failure reported by a backend collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    /// The backend refused the content itself
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("{0}")]
    Other(String),
}

/// Where a resource lives in one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTarget {
    /// Object key inside the container
    pub key: String,
    /// Per-resource container, for backends that have one
    pub container: Option<String>,
}

/// Metadata stored alongside an uploaded resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadMeta {
    /// Canonical path of the resource
    pub path: String,
    pub original_url: String,
    pub upstream_etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
}

impl UploadMeta {
    fn new(file: &FileRecord, response: &UpstreamResponse) -> Self {
        Self {
            path: file.path.clone(),
            original_url: file.original_url.clone(),
            upstream_etag: response.etag.clone(),
            last_modified: response.last_modified.clone(),
            content_type: response.content_type.clone(),
        }
    }
}

/// Backend-side state of a stored resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredObject {
    /// Upstream ETag recorded at upload time
    pub upstream_etag: Option<String>,
}

/// Durable storage for archived documents.
#[async_trait]
pub trait ArchiveBackend: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// ETag cache namespace; distinct per backend.
    fn cache_namespace(&self) -> &str;

    /// Backend location of a resource key.
    fn target(&self, key: &str) -> Result<ArchiveTarget>;

    /// Whether zero-length documents can be stored.
    fn accepts_empty(&self) -> bool {
        true
    }

    /// Metadata of a stored resource; `BackendError::NotFound` when absent.
    async fn lookup(&self, target: &ArchiveTarget) -> std::result::Result<StoredObject, BackendError>;

    async fn container_exists(&self, _container: &str) -> std::result::Result<bool, BackendError> {
        Ok(true)
    }

    async fn create_container(
        &self,
        _container: &str,
        _meta: &UploadMeta,
    ) -> std::result::Result<(), BackendError> {
        Ok(())
    }

    /// Store `body` at `target`, publicly readable.
    async fn upload(
        &self,
        target: &ArchiveTarget,
        body: Vec<u8>,
        meta: &UploadMeta,
    ) -> std::result::Result<(), BackendError>;
}

/// What happened to one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// Upstream confirmed the archived copy is current
    Unchanged,
    Uploaded { etag: Option<String> },
    /// Zero-length document the backend cannot store
    SkippedEmpty,
}

/// Totals of an archive pass over many documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    pub backend: String,
    pub total: usize,
    pub uploaded: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Runs the archive protocol against one backend.
pub struct ArchiveCoordinator {
    backend: Arc<dyn ArchiveBackend>,
    upstream: Arc<dyn Upstream>,
    cache: Arc<dyn EtagStore>,
}

impl ArchiveCoordinator {
    /// Create a coordinator using the backend's namespace of `cache`.
    pub fn new(backend: Arc<dyn ArchiveBackend>, upstream: Arc<dyn Upstream>, cache: &EtagCache) -> Self {
        let cache = Arc::new(cache.scoped(backend.cache_namespace()));
        Self::with_store(backend, upstream, cache)
    }

    pub fn with_store(
        backend: Arc<dyn ArchiveBackend>,
        upstream: Arc<dyn Upstream>,
        cache: Arc<dyn EtagStore>,
    ) -> Self {
        Self {
            backend,
            upstream,
            cache,
        }
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }

    /// Archive one document.
    pub async fn archive(&self, file: &FileRecord) -> Result<ArchiveOutcome> {
        let key = file.resource_key();
        let target = self.backend.target(key)?;
        log::debug!("[{}] Archiving {} to {:?}", self.name(), file.original_url, target);

        let known_etag = self.expected_etag(key, &target).await?;

        let response = self
            .upstream
            .fetch(&file.original_url, known_etag.as_deref())
            .await?;
        match response.status {
            304 => {
                log::info!("[{}] {} is up to date", self.name(), key);
                return Ok(ArchiveOutcome::Unchanged);
            }
            200 => {}
            status => return Err(AppError::upstream_status(&file.original_url, status)),
        }

        if response.body.is_empty() && !self.backend.accepts_empty() {
            log::warn!("[{}] Skipping empty document {}", self.name(), key);
            return Ok(ArchiveOutcome::SkippedEmpty);
        }

        let meta = UploadMeta::new(file, &response);
        if let Some(container) = &target.container {
            self.ensure_container(key, container, &meta).await?;
        }

        log::info!("[{}] Uploading {}", self.name(), key);
        self.backend
            .upload(&target, response.body, &meta)
            .await
            .map_err(|e| self.error(key, e))?;

        if let Some(etag) = &response.etag {
            self.cache.put(key, etag).await?;
        }
        Ok(ArchiveOutcome::Uploaded {
            etag: response.etag,
        })
    }

    /// Archive many documents with bounded concurrency.
    ///
    /// Item failures are logged and counted; they never stop the pass.
    pub async fn archive_all(&self, files: &[FileRecord], concurrency: usize) -> ArchiveReport {
        let mut report = ArchiveReport {
            backend: self.name().to_string(),
            total: files.len(),
            ..ArchiveReport::default()
        };

        let mut results = stream::iter(files)
            .map(|file| async move { (file, self.archive(file).await) })
            .buffer_unordered(concurrency.max(1));

        while let Some((file, result)) = results.next().await {
            match result {
                Ok(ArchiveOutcome::Uploaded { .. }) => report.uploaded += 1,
                Ok(ArchiveOutcome::Unchanged) => report.unchanged += 1,
                Ok(ArchiveOutcome::SkippedEmpty) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    log::error!(
                        "[{}] Failed to archive {} ({}): {}",
                        self.name(),
                        file.path,
                        file.original_url,
                        e
                    );
                }
            }
        }
        report
    }

    /// ETag the archived copy was taken from, if known.
    async fn expected_etag(&self, key: &str, target: &ArchiveTarget) -> Result<Option<String>> {
        if let Some(etag) = self.cache.get(key).await? {
            log::debug!("[{}] Cache hit for {}", self.name(), key);
            return Ok(Some(etag));
        }
        log::debug!("[{}] Cache miss for {}", self.name(), key);

        match self.backend.lookup(target).await {
            Ok(StoredObject {
                upstream_etag: Some(etag),
            }) => {
                self.cache.put(key, &etag).await?;
                Ok(Some(etag))
            }
            Ok(StoredObject {
                upstream_etag: None,
            }) => Ok(None),
            Err(BackendError::NotFound) => Ok(None),
            Err(e) => Err(self.error(key, e)),
        }
    }

    async fn ensure_container(&self, key: &str, container: &str, meta: &UploadMeta) -> Result<()> {
        let exists = self
            .backend
            .container_exists(container)
            .await
            .map_err(|e| self.error(key, e))?;
        if exists {
            return Ok(());
        }

        log::info!("[{}] Creating container {}", self.name(), container);
        match self.backend.create_container(container, meta).await {
            Ok(()) => Ok(()),
            Err(BackendError::AlreadyExists) => {
                log::info!("[{}] Container {} already exists", self.name(), container);
                Ok(())
            }
            Err(e) => Err(self.error(key, e)),
        }
    }

    fn error(&self, key: &str, error: BackendError) -> AppError {
        AppError::backend(self.name(), key, error)
    }
}

/// Build a coordinator for every backend configured in `config`.
pub async fn build_coordinators(
    config: &Config,
    upstream: Arc<dyn Upstream>,
) -> Result<Vec<ArchiveCoordinator>> {
    let cache = EtagCache::new(&config.output.cache_dir);
    let mut coordinators = Vec::new();

    if let Some(s3_config) = &config.archive.s3 {
        #[cfg(feature = "s3")]
        {
            let backend = S3Backend::from_env(&s3_config.bucket).await;
            coordinators.push(ArchiveCoordinator::new(
                Arc::new(backend),
                Arc::clone(&upstream),
                &cache,
            ));
        }
        #[cfg(not(feature = "s3"))]
        return Err(AppError::config(format!(
            "archive.s3 (bucket {}) requires the s3 feature",
            s3_config.bucket
        )));
    }

    if let Some(ia_config) = &config.archive.internet_archive {
        let backend = InternetArchiveBackend::new(ia_config.clone(), &config.crawler)?;
        coordinators.push(ArchiveCoordinator::new(Arc::new(backend), upstream, &cache));
    }

    Ok(coordinators)
}
