use std::path::PathBuf;

use async_trait::async_trait;
use axum::body::Bytes;

use super::{PhotoStore, check_key, redact_key};
use crate::error::{AppError, Result};

/// Writes photos below a directory on local disk.
///
/// The router serves that directory under `/uploads`, so `public_base` is
/// normally `<base_url>/uploads`.
pub struct LocalFsStore {
    root: PathBuf,
    public_base: String,
}

impl LocalFsStore {
    #[must_use]
    pub fn new(root: PathBuf, public_base: &str) -> Self {
        Self {
            root,
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PhotoStore for LocalFsStore {
    fn backend_tag(&self) -> &'static str {
        "localfs"
    }

    async fn put(&self, key: &str, _content_type: &str, bytes: Bytes) -> Result<String> {
        check_key(key)?;
        let path = self.root.join(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("create dir failed: {e}")))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AppError::Storage(format!("write failed: {e}")))?;

        tracing::debug!(key = %redact_key(key), size = bytes.len(), "Stored photo on local disk");
        Ok(format!("{}/{}", self.public_base, key))
    }
}
