//! Photo storage collaborators.
//!
//! Intake writes each photo under `<token>/<index>.<ext>` and records the
//! returned public URL. Keys never collide across orders because every key is
//! namespaced by a fresh token.

mod bucket;
mod local;

pub use bucket::{BucketStore, RetryPolicy};
pub use local::LocalFsStore;

use async_trait::async_trait;
use axum::body::Bytes;

use crate::error::{AppError, Result};
use crate::id::token_prefix;

#[async_trait]
pub trait PhotoStore: Send + Sync + 'static {
    /// Backend name for logs.
    fn backend_tag(&self) -> &'static str;

    /// Persist `bytes` under `key` and return the URL the public page loads it from.
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<String>;
}

/// File extension for an image content type.
pub fn extension_for(content_type: &str) -> &'static str {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("png") {
        "png"
    } else if ct.contains("webp") {
        "webp"
    } else if ct.contains("gif") {
        "gif"
    } else {
        "jpg"
    }
}

/// Storage key for the `index`-th photo (1-based) of an order.
pub fn photo_key(token: &str, index: usize, content_type: &str) -> String {
    format!("{}/{}.{}", token, index, extension_for(content_type))
}

/// A storage key with its token segment cut to the log prefix.
pub fn redact_key(key: &str) -> String {
    match key.split_once('/') {
        Some((token, rest)) => format!("{}***/{}", token_prefix(token), rest),
        None => format!("{}***", token_prefix(key)),
    }
}

/// Rejects keys that could escape the storage root.
pub(crate) fn check_key(key: &str) -> Result<()> {
    let safe = !key.is_empty()
        && !key.starts_with('/')
        && key
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..")
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '-' | '_'));
    if safe {
        Ok(())
    } else {
        Err(AppError::Storage(format!(
            "refusing unsafe storage key: {}",
            redact_key(key)
        )))
    }
}
