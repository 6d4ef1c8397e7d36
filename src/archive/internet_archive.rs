//! Write-once archive backend.
//!
//! Talks to an S3-compatible archive endpoint where every document gets its
//! own bucket ("item"), named by the derived identifier and described by
//! `x-archive-meta-*` headers. Old versions are kept rather than replaced.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, RequestBuilder, StatusCode};

use super::{ArchiveBackend, ArchiveTarget, BackendError, StoredObject, UploadMeta};
use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, InternetArchiveConfig};
use crate::services::create_async_client;
use crate::services::identifier::path_identifier;

const UPSTREAM_ETAG_HEADER: &str = "x-amz-meta-upstream-etag";
const LAST_MODIFIED_HEADER: &str = "x-amz-meta-last-modified";

/// Archive backend with one container per document.
pub struct InternetArchiveBackend {
    client: Client,
    config: InternetArchiveConfig,
}

impl InternetArchiveBackend {
    pub fn new(config: InternetArchiveConfig, crawler: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(crawler)?,
            config,
        })
    }

    fn bucket_url(&self, container: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), container)
    }

    fn object_url(&self, target: &ArchiveTarget) -> Result<String> {
        let container = target
            .container
            .as_deref()
            .ok_or_else(|| AppError::backend(self.name(), &target.key, "no container"))?;
        let object = target
            .key
            .trim_start_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Ok(format!("{}/{}", self.bucket_url(container), object))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(
            "authorization",
            format!("LOW {}:{}", self.config.access_key, self.config.secret_key),
        )
    }

    /// Descriptive headers attached when a container is created.
    fn container_headers(&self, meta: &UploadMeta) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("x-archive-keep-old-version", "1".to_string()),
            ("x-archive-meta-description", meta.path.clone()),
            ("x-archive-meta-licenseurl", self.config.license_url.clone()),
            ("x-archive-meta-mediatype", self.config.mediatype.clone()),
            ("x-archive-meta-publisher", self.config.publisher.clone()),
            ("x-archive-meta-rights", self.config.rights.clone()),
            ("x-archive-meta-subject", self.config.keywords.clone()),
            ("x-archive-meta-title", document_title(&meta.path)),
            ("x-archive-meta-collection", self.config.collection.clone()),
        ];
        if let Some(content_type) = &meta.content_type {
            headers.push(("x-archive-meta-content-type", content_type.clone()));
        }
        if let Some(date) = meta.last_modified.as_deref().and_then(publish_date) {
            headers.push(("x-archive-meta-date", date));
        }
        headers
            .into_iter()
            .map(|(name, value)| (name, header_value(&value)))
            .collect()
    }
}

#[async_trait]
impl ArchiveBackend for InternetArchiveBackend {
    fn name(&self) -> &str {
        "internet-archive"
    }

    fn cache_namespace(&self) -> &str {
        "internet-archive-file-archive"
    }

    fn target(&self, key: &str) -> Result<ArchiveTarget> {
        let identifier = path_identifier(key);
        if identifier.is_empty() {
            return Err(AppError::backend(self.name(), key, "no usable identifier"));
        }
        Ok(ArchiveTarget {
            key: key.to_string(),
            container: Some(identifier),
        })
    }

    fn accepts_empty(&self) -> bool {
        false
    }

    async fn lookup(&self, target: &ArchiveTarget) -> std::result::Result<StoredObject, BackendError> {
        let url = self.object_url(target).map_err(other)?;
        let response = self
            .authorized(self.client.head(&url))
            .send()
            .await
            .map_err(other)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(BackendError::NotFound),
            status if status.is_success() => Ok(StoredObject {
                upstream_etag: response
                    .headers()
                    .get(UPSTREAM_ETAG_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
            }),
            status => Err(BackendError::Other(format!("HEAD {url} returned {status}"))),
        }
    }

    async fn container_exists(&self, container: &str) -> std::result::Result<bool, BackendError> {
        let url = self.bucket_url(container);
        let response = self
            .authorized(self.client.head(&url))
            .send()
            .await
            .map_err(other)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(BackendError::Other(format!("HEAD {url} returned {status}"))),
        }
    }

    async fn create_container(
        &self,
        container: &str,
        meta: &UploadMeta,
    ) -> std::result::Result<(), BackendError> {
        let mut request = self.authorized(self.client.put(self.bucket_url(container)));
        for (name, value) in self.container_headers(meta) {
            request = request.header(name, value);
        }
        let response = request.send().await.map_err(other)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT || body.contains("BucketAlreadyExists") {
            return Err(BackendError::AlreadyExists);
        }
        Err(BackendError::Other(format!(
            "create {container} returned {status}: {}",
            body.trim()
        )))
    }

    async fn upload(
        &self,
        target: &ArchiveTarget,
        body: Vec<u8>,
        meta: &UploadMeta,
    ) -> std::result::Result<(), BackendError> {
        let url = self.object_url(target).map_err(other)?;
        let mut request = self
            .authorized(self.client.put(&url))
            .header("x-archive-keep-old-version", "1")
            .body(body);
        if let Some(etag) = &meta.upstream_etag {
            request = request.header(UPSTREAM_ETAG_HEADER, header_value(etag));
        }
        if let Some(last_modified) = &meta.last_modified {
            request = request.header(LAST_MODIFIED_HEADER, header_value(last_modified));
        }
        if let Some(content_type) = &meta.content_type {
            request = request.header("content-type", header_value(content_type));
        }
        let response = request.send().await.map_err(other)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        if text.contains("BadContent") {
            return Err(BackendError::Rejected(text.trim().to_string()));
        }
        Err(BackendError::Other(format!("PUT {url} returned {status}: {}", text.trim())))
    }
}

fn other(error: impl std::fmt::Display) -> BackendError {
    BackendError::Other(error.to_string())
}

/// File name without directory or extension.
fn document_title(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

/// Archive publish date from an HTTP `Last-Modified` value.
fn publish_date(last_modified: &str) -> Option<String> {
    DateTime::parse_from_rfc2822(last_modified)
        .ok()
        .map(|date| date.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Header-safe value; non-ASCII text uses the archive's `uri()` escape.
fn header_value(value: &str) -> String {
    if value.chars().all(|c| c == ' ' || c.is_ascii_graphic()) {
        value.to_string()
    } else {
        format!("uri({})", urlencoding::encode(value))
    }
}
