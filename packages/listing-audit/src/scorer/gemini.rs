//! Gemini-backed [`VisionModel`].

use async_trait::async_trait;
use gemini_client::{Content, GeminiClient, GenerateContentRequest};
use tracing::debug;

use super::VisionModel;
use crate::config::AuditConfig;
use crate::error::ModelError;
use crate::types::EncodedImage;

/// Deterministic sampling: the same image must always earn the same score.
const TEMPERATURE: f32 = 0.0;

pub struct GeminiVisionModel {
    client: GeminiClient,
    model: String,
    max_output_tokens: u32,
}

impl GeminiVisionModel {
    pub fn new(client: GeminiClient, model: impl Into<String>, max_output_tokens: u32) -> Self {
        Self {
            client,
            model: model.into(),
            max_output_tokens,
        }
    }

    /// Build from `GEMINI_API_KEY` and the batch configuration.
    ///
    /// Fails when no API key is configured; the batch must not start
    /// without a usable model.
    pub fn from_env(config: &AuditConfig) -> Result<Self, ModelError> {
        let client = GeminiClient::from_env()?.with_timeout(config.scoring_timeout());
        Ok(Self::new(client, &config.model, config.max_output_tokens))
    }

    fn request(&self, prompt: &str, image: &EncodedImage) -> GenerateContentRequest {
        GenerateContentRequest::new()
            .content(
                Content::user()
                    .text(prompt)
                    .inline_image(&image.mime_type, &image.data),
            )
            .temperature(TEMPERATURE)
            .max_output_tokens(self.max_output_tokens)
    }
}

#[async_trait]
impl VisionModel for GeminiVisionModel {
    async fn generate(&self, prompt: &str, image: &EncodedImage) -> Result<String, ModelError> {
        let request = self.request(prompt, image);
        let response = self.client.generate_content(&self.model, &request).await?;

        if let Some(usage) = &response.usage {
            debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                "Gemini usage"
            );
        }

        Ok(response.text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_deterministic_and_capped() {
        let model = GeminiVisionModel::new(GeminiClient::new("k"), "gemini-2.0-flash", 1500);
        let request = model.request("rubric", &EncodedImage::jpeg(vec![1, 2, 3]));

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["temperature"], 0.0);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1500);
        assert_eq!(json["contents"][0]["parts"][0]["text"], "rubric");
        assert_eq!(
            json["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/jpeg"
        );
        assert_eq!(model.name(), "gemini-2.0-flash");
    }
}
