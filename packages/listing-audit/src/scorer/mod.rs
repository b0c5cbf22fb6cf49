//! Image quality scoring.
//!
//! [`ImageScorer`] turns one staged image into an analysis text and a
//! rating. The remote model sits behind the [`VisionModel`] trait so tests
//! can substitute a fake. Scoring never fails from the caller's point of
//! view: any error becomes the scoring-failure sentinel with rating 0.

pub mod gemini;
pub mod prompts;
pub mod rate_limited;
pub mod rating;

pub use gemini::GeminiVisionModel;
pub use rate_limited::RateLimitedModel;
pub use rating::extract_rating;

use async_trait::async_trait;
use image::ImageFormat;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

use crate::error::ModelError;
use crate::types::{AnalysisOutcome, EncodedImage, ImageAnalysis, ImageReference};

/// The remote multimodal capability: rubric + image in, free text out.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn generate(&self, prompt: &str, image: &EncodedImage) -> Result<String, ModelError>;

    /// Model name for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<M: VisionModel + ?Sized> VisionModel for Box<M> {
    async fn generate(&self, prompt: &str, image: &EncodedImage) -> Result<String, ModelError> {
        (**self).generate(prompt, image).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<M: VisionModel + ?Sized> VisionModel for Arc<M> {
    async fn generate(&self, prompt: &str, image: &EncodedImage) -> Result<String, ModelError> {
        (**self).generate(prompt, image).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Reasons a single scoring attempt failed.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("failed to read staged image: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image processing task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Analysis text and rating for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub text: String,
    pub rating: f64,
    pub outcome: AnalysisOutcome,
}

impl ScoreOutcome {
    pub fn into_analysis(self, reference: &ImageReference) -> ImageAnalysis {
        ImageAnalysis {
            position: reference.position,
            url: reference.url.clone(),
            text: self.text,
            rating: self.rating,
            outcome: self.outcome,
        }
    }
}

/// Scores staged images with a [`VisionModel`].
pub struct ImageScorer<M: VisionModel> {
    model: M,
    timeout: Duration,
}

impl<M: VisionModel> ImageScorer<M> {
    /// Create a scorer; each remote call is abandoned after `timeout`.
    pub fn new(model: M, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Score one staged image. `image_number` is 1-based.
    pub async fn score(&self, path: &Path, source_url: &str, image_number: usize) -> ScoreOutcome {
        match self.try_score(path, source_url, image_number).await {
            Ok(text) => {
                let rating = rating::extract_rating(&text);
                debug!(url = %source_url, image_number, rating, "Image scored");
                ScoreOutcome {
                    text,
                    rating,
                    outcome: AnalysisOutcome::Scored,
                }
            }
            Err(e) => {
                error!(
                    url = %source_url,
                    image_number,
                    model = self.model.name(),
                    error = %e,
                    "Failed to analyze image"
                );
                ScoreOutcome {
                    text: prompts::scoring_failure_analysis(image_number),
                    rating: 0.0,
                    outcome: AnalysisOutcome::ScoringFailed,
                }
            }
        }
    }

    async fn try_score(
        &self,
        path: &Path,
        source_url: &str,
        image_number: usize,
    ) -> Result<String, ScoreError> {
        let bytes = tokio::fs::read(path).await?;

        let image = tokio::task::spawn_blocking(move || normalize_image(&bytes))
            .await
            .map_err(|e| ScoreError::Task(e.to_string()))??;

        let prompt = prompts::format_rubric_prompt(image_number, source_url);

        let response = tokio::time::timeout(self.timeout, self.model.generate(&prompt, &image))
            .await
            .map_err(|_| ModelError::Timeout(self.timeout))??;

        Ok(response.trim().to_string())
    }
}

/// Decode any supported format and re-encode as RGB JPEG.
pub fn normalize_image(bytes: &[u8]) -> Result<EncodedImage, image::ImageError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();

    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(rgb).write_to(&mut out, ImageFormat::Jpeg)?;

    Ok(EncodedImage::jpeg(out.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{png_bytes, MockVisionModel};

    fn staged_png(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("image_1_0.jpg");
        std::fs::write(&path, png_bytes(8, 6)).unwrap();
        path
    }

    #[test]
    fn test_normalize_image_produces_jpeg() {
        let encoded = normalize_image(&png_bytes(4, 4)).unwrap();

        assert_eq!(encoded.mime_type, "image/jpeg");
        assert_eq!(&encoded.data[..2], &[0xff, 0xd8]);
    }

    #[test]
    fn test_normalize_image_rejects_garbage() {
        assert!(normalize_image(b"<html>not an image</html>").is_err());
    }

    #[tokio::test]
    async fn test_score_keeps_text_and_rating() {
        let dir = tempfile::tempdir().unwrap();
        let path = staged_png(&dir);
        let model = MockVisionModel::new().with_response(
            "https://img.example.com/a.jpg",
            "  Imagen 1:\nPuntuación Individual (0-10): 8\nJustificación: Buena luz.\n",
        );

        let scorer = ImageScorer::new(model.clone(), Duration::from_secs(5));
        let outcome = scorer.score(&path, "https://img.example.com/a.jpg", 1).await;

        assert_eq!(outcome.rating, 8.0);
        assert_eq!(outcome.outcome, AnalysisOutcome::Scored);
        assert_eq!(
            outcome.text,
            "Imagen 1:\nPuntuación Individual (0-10): 8\nJustificación: Buena luz."
        );

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("Foto 1 con URL: https://img.example.com/a.jpg"));
        assert_eq!(calls[0].mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_unlabelled_response_keeps_text_with_zero_rating() {
        let dir = tempfile::tempdir().unwrap();
        let path = staged_png(&dir);
        let model = MockVisionModel::new().with_default_response("Una foto correcta sin puntuación.");

        let scorer = ImageScorer::new(model, Duration::from_secs(5));
        let outcome = scorer.score(&path, "https://img.example.com/a.jpg", 1).await;

        assert_eq!(outcome.rating, 0.0);
        assert_eq!(outcome.outcome, AnalysisOutcome::Scored);
        assert_eq!(outcome.text, "Una foto correcta sin puntuación.");
    }

    #[tokio::test]
    async fn test_model_error_yields_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let path = staged_png(&dir);
        let model = MockVisionModel::new().with_error("https://img.example.com/a.jpg");

        let scorer = ImageScorer::new(model, Duration::from_secs(5));
        let outcome = scorer.score(&path, "https://img.example.com/a.jpg", 4).await;

        assert_eq!(outcome.rating, 0.0);
        assert_eq!(outcome.outcome, AnalysisOutcome::ScoringFailed);
        assert_eq!(outcome.text, prompts::scoring_failure_analysis(4));
    }

    #[tokio::test]
    async fn test_undecodable_image_skips_remote_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image_1_0.jpg");
        std::fs::write(&path, b"<html>404</html>").unwrap();
        let model = MockVisionModel::new().with_default_response("Puntuación Individual (0-10): 9");

        let scorer = ImageScorer::new(model.clone(), Duration::from_secs(5));
        let outcome = scorer.score(&path, "https://img.example.com/a.jpg", 1).await;

        assert_eq!(outcome.outcome, AnalysisOutcome::ScoringFailed);
        assert_eq!(outcome.rating, 0.0);
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_yields_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let model = MockVisionModel::new();

        let scorer = ImageScorer::new(model, Duration::from_secs(5));
        let outcome = scorer
            .score(&dir.path().join("absent.jpg"), "https://img.example.com/a.jpg", 2)
            .await;

        assert_eq!(outcome.outcome, AnalysisOutcome::ScoringFailed);
    }

    #[tokio::test]
    async fn test_slow_model_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = staged_png(&dir);
        let model = MockVisionModel::new()
            .with_default_response("Puntuación Individual (0-10): 9")
            .with_delay(Duration::from_secs(5));

        let scorer = ImageScorer::new(model, Duration::from_millis(50));
        let outcome = scorer.score(&path, "https://img.example.com/a.jpg", 1).await;

        assert_eq!(outcome.outcome, AnalysisOutcome::ScoringFailed);
        assert_eq!(outcome.rating, 0.0);
    }
}
