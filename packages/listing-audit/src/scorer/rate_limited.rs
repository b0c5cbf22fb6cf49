//! Rate-limited model wrapper.
//!
//! Wraps any [`VisionModel`] with a requests-per-minute cap using the
//! governor crate. Clones share one limiter, so concurrent scorers draw
//! from the same budget.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use super::VisionModel;
use crate::error::ModelError;
use crate::types::EncodedImage;

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

pub struct RateLimitedModel<M: VisionModel> {
    inner: M,
    limiter: Arc<DefaultRateLimiter>,
}

impl<M: VisionModel + Clone> Clone for RateLimitedModel<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
        }
    }
}

impl<M: VisionModel> RateLimitedModel<M> {
    /// Allow at most `requests_per_minute` remote calls, without bursts.
    pub fn per_minute(inner: M, requests_per_minute: NonZeroU32) -> Self {
        Self::with_quota(
            inner,
            Quota::per_minute(requests_per_minute).allow_burst(NonZeroU32::MIN),
        )
    }

    /// Create with a custom quota.
    pub fn with_quota(inner: M, quota: Quota) -> Self {
        Self {
            inner,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

#[async_trait]
impl<M: VisionModel> VisionModel for RateLimitedModel<M> {
    async fn generate(&self, prompt: &str, image: &EncodedImage) -> Result<String, ModelError> {
        self.limiter.until_ready().await;
        self.inner.generate(prompt, image).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockVisionModel;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_passes_through_responses() {
        let mock = MockVisionModel::new().with_default_response("Puntuación Individual (0-10): 7");
        let model = RateLimitedModel::per_minute(mock.clone(), NonZeroU32::new(600).unwrap());

        let text = model
            .generate("rubric", &EncodedImage::jpeg(vec![0]))
            .await
            .unwrap();

        assert_eq!(text, "Puntuación Individual (0-10): 7");
        assert_eq!(mock.calls().len(), 1);
        assert_eq!(model.name(), mock.name());
    }

    #[tokio::test]
    async fn test_spaces_out_calls() {
        let mock = MockVisionModel::new().with_default_response("ok");
        // 1200/min = one every 50ms
        let model = RateLimitedModel::per_minute(mock, NonZeroU32::new(1200).unwrap());
        let image = EncodedImage::jpeg(vec![0]);

        let start = Instant::now();
        for _ in 0..3 {
            model.generate("rubric", &image).await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn test_clones_share_budget() {
        let mock = MockVisionModel::new().with_default_response("ok");
        let model = RateLimitedModel::per_minute(mock.clone(), NonZeroU32::new(1200).unwrap());
        let other = model.clone();
        let image = EncodedImage::jpeg(vec![0]);

        let start = Instant::now();
        model.generate("rubric", &image).await.unwrap();
        other.generate("rubric", &image).await.unwrap();
        model.generate("rubric", &image).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(90));
        assert_eq!(mock.calls().len(), 3);
    }
}
