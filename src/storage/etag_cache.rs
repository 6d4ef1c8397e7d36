//! Persistent ETag cache.
//!
//! Remembers, per archive backend, the upstream ETag of the last version that
//! was successfully archived. Keys are hashed into a two-level fan-out:
//!
//! ```text
//! {root}/
//! └── {namespace}/
//!     └── {hh}/
//!         └── {sha256(key) hex}   # file content is the ETag
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Key/value store of archived ETags for one backend.
#[async_trait]
pub trait EtagStore: Send + Sync {
    /// ETag recorded for `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Record `etag` for `key`, replacing any previous value.
    async fn put(&self, key: &str, etag: &str) -> Result<()>;
}

/// Root of the on-disk cache, shared by all backends.
#[derive(Debug, Clone)]
pub struct EtagCache {
    root: PathBuf,
}

impl EtagCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache view for one backend namespace.
    pub fn scoped(&self, namespace: &str) -> ScopedEtagCache {
        ScopedEtagCache {
            dir: self.root.join(namespace),
        }
    }
}

/// The cache entries of a single namespace.
#[derive(Debug, Clone)]
pub struct ScopedEtagCache {
    dir: PathBuf,
}

impl ScopedEtagCache {
    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.dir.join(&digest[..2]).join(digest)
    }
}

#[async_trait]
impl EtagStore for ScopedEtagCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.entry_path(key)).await {
            Ok(etag) => Ok(Some(etag)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn put(&self, key: &str, etag: &str) -> Result<()> {
        let path = self.entry_path(key);
        let Some(parent) = path.parent() else {
            return Err(AppError::config(format!("Invalid cache path {:?}", path)));
        };
        tokio::fs::create_dir_all(parent).await?;

        // Unique temp name so concurrent writers never share a file.
        let tmp = parent.join(format!(
            ".{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(etag.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        log::debug!("Cached ETag for {}", key);
        Ok(())
    }
}
