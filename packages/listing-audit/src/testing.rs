//! Testing utilities including mock implementations.
//!
//! These let the pipeline run end to end without network access or a real
//! model: [`MockFetcher`] serves canned image bytes or HTTP failures per URL,
//! [`MockVisionModel`] answers with canned analyses per image URL or in call
//! order.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{FetchError, FetchResult, ModelError};
use crate::fetcher::ImageFetcher;
use crate::scorer::VisionModel;
use crate::types::{EncodedImage, StagedImage};

/// Encode a small solid-colour PNG, handy as a decodable test image.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("in-memory PNG encoding cannot fail");
    out.into_inner()
}

// =============================================================================
// MockFetcher
// =============================================================================

#[derive(Debug, Clone)]
enum FetchStep {
    Image(Vec<u8>),
    Status(u16),
    Timeout,
}

/// A scripted image fetcher.
///
/// Each URL has a queue of steps consumed one per attempt; the last step
/// repeats. URLs without a script fail with a network error.
#[derive(Clone, Default)]
pub struct MockFetcher {
    scripts: Arc<RwLock<HashMap<String, VecDeque<FetchStep>>>>,
    attempts: Arc<RwLock<HashMap<String, usize>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for `url`.
    pub fn with_image(self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.push(url.into(), FetchStep::Image(bytes));
        self
    }

    /// Fail the next attempts for `url` with these HTTP statuses.
    pub fn with_failures(self, url: impl Into<String>, statuses: Vec<u16>) -> Self {
        let url = url.into();
        for status in statuses {
            self.push(url.clone(), FetchStep::Status(status));
        }
        self
    }

    /// Time out the next attempt for `url`.
    pub fn with_timeout(self, url: impl Into<String>) -> Self {
        self.push(url.into(), FetchStep::Timeout);
        self
    }

    /// Number of fetch attempts made for `url`.
    pub fn attempts(&self, url: &str) -> usize {
        self.attempts.read().unwrap().get(url).copied().unwrap_or(0)
    }

    /// Total fetch attempts across all URLs.
    pub fn total_attempts(&self) -> usize {
        self.attempts.read().unwrap().values().sum()
    }

    fn push(&self, url: String, step: FetchStep) {
        self.scripts
            .write()
            .unwrap()
            .entry(url)
            .or_default()
            .push_back(step);
    }

    fn next_step(&self, url: &str) -> Option<FetchStep> {
        let mut scripts = self.scripts.write().unwrap();
        let queue = scripts.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl ImageFetcher for MockFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> FetchResult<StagedImage> {
        *self
            .attempts
            .write()
            .unwrap()
            .entry(url.to_string())
            .or_default() += 1;

        match self.next_step(url) {
            Some(FetchStep::Image(bytes)) => {
                tokio::fs::write(dest, &bytes)
                    .await
                    .map_err(|source| FetchError::Io {
                        url: url.to_string(),
                        source,
                    })?;
                Ok(StagedImage {
                    path: dest.to_path_buf(),
                    bytes_written: bytes.len() as u64,
                })
            }
            Some(FetchStep::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            Some(FetchStep::Timeout) => Err(FetchError::Timeout {
                url: url.to_string(),
            }),
            None => Err(FetchError::Network {
                url: url.to_string(),
                message: "no mock route".to_string(),
            }),
        }
    }
}

// =============================================================================
// MockVisionModel
// =============================================================================

/// Record of a call made to the mock model.
#[derive(Debug, Clone)]
pub struct MockModelCall {
    pub prompt: String,
    pub mime_type: String,
    pub image_len: usize,
}

/// A mock vision model with canned responses keyed by image URL.
///
/// The URL is recovered from the rubric prompt, which embeds it on its own
/// line. Clones share responses and call history.
#[derive(Clone, Default)]
pub struct MockVisionModel {
    responses: Arc<RwLock<HashMap<String, String>>>,
    errors: Arc<RwLock<HashSet<String>>>,
    sequence: Arc<RwLock<VecDeque<String>>>,
    default_response: Arc<RwLock<Option<String>>>,
    delay: Option<Duration>,
    calls: Arc<RwLock<Vec<MockModelCall>>>,
}

impl MockVisionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer with `text` for the image at `url`.
    pub fn with_response(self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.responses
            .write()
            .unwrap()
            .insert(url.into(), text.into());
        self
    }

    /// Answer with an analysis whose score line carries `rating`.
    pub fn with_rating(self, url: impl Into<String>, rating: f64) -> Self {
        let text = format!(
            "Descripción del Plano y Composición: Plano lateral.\nPuntuación Individual (0-10): {}\nJustificación: Prueba.",
            rating
        );
        self.with_response(url, text)
    }

    /// Fail the remote call for the image at `url`.
    pub fn with_error(self, url: impl Into<String>) -> Self {
        self.errors.write().unwrap().insert(url.into());
        self
    }

    /// Answer calls without a URL-specific response with these texts, in
    /// order. Once exhausted, the default response applies.
    pub fn with_responses(self, texts: Vec<String>) -> Self {
        self.sequence.write().unwrap().extend(texts);
        self
    }

    /// Answer with `text` when no URL-specific response matches.
    pub fn with_default_response(self, text: impl Into<String>) -> Self {
        *self.default_response.write().unwrap() = Some(text.into());
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockModelCall> {
        self.calls.read().unwrap().clone()
    }

    fn matches(prompt: &str, url: &str) -> bool {
        prompt.contains(&format!("URL: {}\n", url))
    }
}

#[async_trait]
impl VisionModel for MockVisionModel {
    async fn generate(&self, prompt: &str, image: &EncodedImage) -> Result<String, ModelError> {
        self.calls.write().unwrap().push(MockModelCall {
            prompt: prompt.to_string(),
            mime_type: image.mime_type.clone(),
            image_len: image.data.len(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .errors
            .read()
            .unwrap()
            .iter()
            .any(|url| Self::matches(prompt, url));
        if failing {
            return Err(ModelError::Request("mock remote failure".to_string()));
        }

        let canned = self
            .responses
            .read()
            .unwrap()
            .iter()
            .find(|(url, _)| Self::matches(prompt, url))
            .map(|(_, text)| text.clone());

        canned
            .or_else(|| self.sequence.write().unwrap().pop_front())
            .or_else(|| self.default_response.read().unwrap().clone())
            .ok_or_else(|| ModelError::Request("no canned response".to_string()))
    }

    fn name(&self) -> &str {
        "mock-vision"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::prompts::format_rubric_prompt;

    #[tokio::test]
    async fn test_mock_model_matches_exact_url() {
        let model = MockVisionModel::new()
            .with_response("https://img.example.com/a.jpg", "A")
            .with_response("https://img.example.com/a.jpg2", "A2");
        let image = EncodedImage::jpeg(vec![1]);

        let a = model
            .generate(&format_rubric_prompt(1, "https://img.example.com/a.jpg"), &image)
            .await
            .unwrap();
        let a2 = model
            .generate(&format_rubric_prompt(2, "https://img.example.com/a.jpg2"), &image)
            .await
            .unwrap();

        assert_eq!(a, "A");
        assert_eq!(a2, "A2");
        assert_eq!(model.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_model_sequential_responses() {
        let model = MockVisionModel::new()
            .with_response("https://img.example.com/pinned.jpg", "pinned")
            .with_responses(vec!["first".to_string(), "second".to_string()])
            .with_default_response("fallback");
        let image = EncodedImage::jpeg(vec![1]);

        let mut answers = Vec::new();
        for (n, url) in [
            (1, "https://img.example.com/a.jpg"),
            (2, "https://img.example.com/pinned.jpg"),
            (3, "https://img.example.com/b.jpg"),
            (4, "https://img.example.com/c.jpg"),
        ] {
            answers.push(
                model
                    .generate(&format_rubric_prompt(n, url), &image)
                    .await
                    .unwrap(),
            );
        }

        assert_eq!(answers, vec!["first", "pinned", "second", "fallback"]);
    }

    #[tokio::test]
    async fn test_mock_fetcher_last_step_repeats() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MockFetcher::new()
            .with_failures("u", vec![500])
            .with_image("u", vec![1, 2, 3]);

        assert!(fetcher.fetch("u", &dir.path().join("1")).await.is_err());
        assert!(fetcher.fetch("u", &dir.path().join("2")).await.is_ok());
        assert!(fetcher.fetch("u", &dir.path().join("3")).await.is_ok());
        assert_eq!(fetcher.attempts("u"), 3);
        assert!(fetcher.fetch("other", &dir.path().join("4")).await.is_err());
    }
}
