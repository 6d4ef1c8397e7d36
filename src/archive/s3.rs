//! AWS S3 archive backend.
//!
//! All documents share one pre-existing bucket; the resource key is the
//! object key and the upstream ETag travels as user metadata.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;

use super::{ArchiveBackend, ArchiveTarget, BackendError, StoredObject, UploadMeta};
use crate::error::Result;

const UPSTREAM_ETAG: &str = "upstream-etag";
const LAST_MODIFIED: &str = "last-modified";

/// Shared-bucket archive backend.
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Create a backend with credentials from the standard AWS environment.
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), bucket)
    }
}

#[async_trait]
impl ArchiveBackend for S3Backend {
    fn name(&self) -> &str {
        "s3"
    }

    fn cache_namespace(&self) -> &str {
        "s3-file-archive"
    }

    fn target(&self, key: &str) -> Result<ArchiveTarget> {
        Ok(ArchiveTarget {
            key: key.to_string(),
            container: None,
        })
    }

    async fn lookup(&self, target: &ArchiveTarget) -> std::result::Result<StoredObject, BackendError> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&target.key)
            .send()
            .await;

        match result {
            Ok(output) => Ok(StoredObject {
                upstream_etag: output
                    .metadata()
                    .and_then(|metadata| metadata.get(UPSTREAM_ETAG))
                    .cloned(),
            }),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    log::debug!("No object at s3://{}/{}", self.bucket, target.key);
                    Err(BackendError::NotFound)
                } else {
                    Err(BackendError::Other(service_err.to_string()))
                }
            }
        }
    }

    async fn upload(
        &self,
        target: &ArchiveTarget,
        body: Vec<u8>,
        meta: &UploadMeta,
    ) -> std::result::Result<(), BackendError> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&target.key)
            .body(ByteStream::from(body))
            .acl(ObjectCannedAcl::PublicRead);
        if let Some(etag) = &meta.upstream_etag {
            request = request.metadata(UPSTREAM_ETAG, etag);
        }
        if let Some(last_modified) = &meta.last_modified {
            request = request.metadata(LAST_MODIFIED, last_modified);
        }
        if let Some(content_type) = &meta.content_type {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .map_err(|e| BackendError::Other(e.into_service_error().to_string()))?;
        log::info!("Wrote s3://{}/{}", self.bucket, target.key);
        Ok(())
    }
}
