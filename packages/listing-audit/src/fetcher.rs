//! Image downloads.
//!
//! [`HttpImageFetcher`] makes exactly one attempt per call and streams the
//! body straight to the staging file. Bounded retries live in
//! [`RetryingFetcher`], which wraps any fetcher.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::types::StagedImage;

/// Downloads one image to a local path.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch `url` into `dest`, creating or overwriting it.
    ///
    /// On failure a partial file may remain at `dest`; callers ignore it.
    async fn fetch(&self, url: &str, dest: &Path) -> FetchResult<StagedImage>;
}

/// HTTP image fetcher backed by reqwest.
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        // Some image CDNs reject requests without a browser-like User-Agent
        let user_agent = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }

    /// Use a preconfigured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Wrap this fetcher with a retry policy.
    pub fn retrying(self, policy: RetryPolicy) -> RetryingFetcher<Self> {
        RetryingFetcher::new(self, policy)
    }

    fn transport_error(url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = err.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> FetchResult<StagedImage> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
            });
        }

        debug!(url = %url, dest = %dest.display(), "Downloading image");

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| Self::transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let io_err = |source: std::io::Error| FetchError::Io {
            url: url.to_string(),
            source,
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
        let mut bytes_written: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Self::transport_error(url, e))?
        {
            file.write_all(&chunk).await.map_err(io_err)?;
            bytes_written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_err)?;

        debug!(url = %url, bytes = bytes_written, "Image downloaded");

        Ok(StagedImage {
            path: dest.to_path_buf(),
            bytes_written,
        })
    }
}

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(5))
    }
}

/// A fetcher wrapper that retries transient failures.
///
/// Timeouts, connection errors, 429 and 5xx responses are retried; other
/// client errors and local I/O errors are returned immediately.
pub struct RetryingFetcher<F: ImageFetcher> {
    inner: F,
    policy: RetryPolicy,
}

impl<F: ImageFetcher> RetryingFetcher<F> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

#[async_trait]
impl<F: ImageFetcher> ImageFetcher for RetryingFetcher<F> {
    async fn fetch(&self, url: &str, dest: &Path) -> FetchResult<StagedImage> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;

        loop {
            match self.inner.fetch(url, dest).await {
                Ok(staged) => return Ok(staged),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(
                        url = %url,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Download failed, retrying in {:?}",
                        self.policy.delay
                    );
                    if !self.policy.delay.is_zero() {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;

    #[test]
    fn test_retry_policy_attempts() {
        assert_eq!(RetryPolicy::none().max_attempts(), 1);
        assert_eq!(RetryPolicy::default().max_attempts(), 3);
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://img.example.com/flaky.jpg";
        let mock = MockFetcher::new()
            .with_failures(url, vec![503, 503])
            .with_image(url, b"jpeg-bytes".to_vec());

        let fetcher = RetryingFetcher::new(mock, RetryPolicy::new(2, Duration::ZERO));
        let staged = fetcher
            .fetch(url, &dir.path().join("a.jpg"))
            .await
            .unwrap();

        assert_eq!(staged.bytes_written, 10);
        assert_eq!(fetcher.inner.attempts(url), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://img.example.com/down.jpg";
        let mock = MockFetcher::new().with_failures(url, vec![502, 502, 502, 502]);

        let fetcher = RetryingFetcher::new(mock, RetryPolicy::new(1, Duration::ZERO));
        let err = fetcher
            .fetch(url, &dir.path().join("a.jpg"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 502, .. }));
        assert_eq!(fetcher.inner.attempts(url), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://img.example.com/gone.jpg";
        let mock = MockFetcher::new().with_failures(url, vec![404]);

        let fetcher = RetryingFetcher::new(mock, RetryPolicy::new(3, Duration::ZERO));
        let err = fetcher
            .fetch(url, &dir.path().join("a.jpg"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(fetcher.inner.attempts(url), 1);
    }

    #[tokio::test]
    async fn test_http_fetcher_rejects_non_http_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = HttpImageFetcher::new(Duration::from_secs(1)).unwrap();

        let err = fetcher
            .fetch("file:///etc/passwd", &dir.path().join("a.jpg"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::InvalidUrl { .. }));
        assert!(!dir.path().join("a.jpg").exists());
    }
}
