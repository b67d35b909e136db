use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};

use super::{PhotoStore, check_key, redact_key};
use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 200,
        }
    }
}

/// Uploads photos to an S3-compatible bucket gateway with a bearer-authorized
/// `PUT {endpoint}/{bucket}/{key}`. Objects are then read by browsers from
/// `{public_url}/{key}`.
pub struct BucketStore {
    endpoint: String,
    bucket: String,
    auth_bearer: Option<String>,
    public_url: String,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl BucketStore {
    #[must_use]
    pub fn new(
        endpoint: String,
        bucket: String,
        auth_bearer: Option<String>,
        public_url: String,
        retry: RetryPolicy,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.trim_matches('/').to_string(),
            auth_bearer,
            public_url: public_url.trim_end_matches('/').to_string(),
            retry,
            client,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }

    fn headers(&self, content_type: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.auth_bearer {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| AppError::Storage(format!("invalid auth header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        let value = HeaderValue::from_str(content_type)
            .map_err(|e| AppError::Storage(format!("invalid content type: {e}")))?;
        headers.insert(CONTENT_TYPE, value);
        Ok(headers)
    }

    #[tracing::instrument(
        name = "bucket_put_with_retry",
        skip(self, key, content_type, bytes),
        fields(key = %redact_key(key), size = bytes.len())
    )]
    async fn put_with_retry(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<String> {
        check_key(key)?;
        let url = self.object_url(key);
        let headers = self.headers(content_type)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let req = self
                .client
                .put(&url)
                .headers(headers.clone())
                .body(bytes.clone());

            match req.send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(format!("{}/{}", self.public_url, key));
                }
                Ok(resp) => {
                    let status = resp.status();
                    // 4xx other than 429 will not improve on retry
                    let transient = status.as_u16() == 429 || status.is_server_error();
                    if !transient || attempt >= self.retry.max_attempts {
                        return Err(AppError::Storage(format!(
                            "upload failed status={status} key={}",
                            redact_key(key)
                        )));
                    }
                    tracing::warn!(attempt, %status, "Bucket upload failed, retrying");
                }
                Err(e) => {
                    // the request URL embeds the key
                    let e = e.without_url();
                    if attempt >= self.retry.max_attempts {
                        return Err(AppError::Storage(format!(
                            "upload failed key={}: {e}",
                            redact_key(key)
                        )));
                    }
                    tracing::warn!(attempt, error = %e, "Bucket upload failed, retrying");
                }
            }

            tokio::time::sleep(Duration::from_millis(
                self.retry.base_backoff_ms.saturating_mul(attempt as u64),
            ))
            .await;
        }
    }
}

#[async_trait]
impl PhotoStore for BucketStore {
    fn backend_tag(&self) -> &'static str {
        "bucket"
    }

    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<String> {
        self.put_with_retry(key, content_type, bytes).await
    }
}
