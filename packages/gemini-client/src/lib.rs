//! Pure Google Gemini REST API client
//!
//! A minimal client for the Gemini `generateContent` endpoint with no
//! domain-specific logic. Supports text and inline image parts.
//!
//! # Example
//!
//! ```rust,ignore
//! use gemini_client::{Content, GeminiClient, GenerateContentRequest};
//!
//! let client = GeminiClient::from_env()?;
//!
//! let request = GenerateContentRequest::new()
//!     .content(Content::user().text("Describe this photo").inline_image("image/jpeg", &bytes))
//!     .temperature(0.0)
//!     .max_output_tokens(1500);
//!
//! let response = client.generate_content("gemini-2.0-flash", &request).await?;
//! println!("{}", response.text);
//! ```

pub mod error;
pub mod types;

pub use error::{GeminiError, Result};
pub use types::*;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretBox};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Pure Gemini API client.
#[derive(Clone)]
pub struct GeminiClient {
    http_client: Client,
    api_key: Arc<SecretBox<str>>,
    base_url: String,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiClient {
    /// Create a new Gemini client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        let api_key: String = api_key.into();
        Self {
            http_client: Client::new(),
            api_key: Arc::new(SecretBox::new(Box::from(api_key.as_str()))),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }

    /// Create from environment variable `GEMINI_API_KEY` (or `GOOGLE_API_KEY`).
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .map_err(|_| GeminiError::Config("GEMINI_API_KEY not set".into()))?;

        if api_key.trim().is_empty() {
            return Err(GeminiError::Config("GEMINI_API_KEY is empty".into()));
        }

        Ok(Self::new(api_key))
    }

    /// Set a custom base URL (for proxies, regional endpoints, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Apply a timeout to every request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate content.
    ///
    /// Sends the request to `models/{model}:generateContent` and returns the
    /// text of the first candidate.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let start = std::time::Instant::now();

        let mut builder = self
            .http_client
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("Content-Type", "application/json")
            .json(request);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "Gemini request failed");
            GeminiError::from_transport(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Gemini API error");
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let raw: types::GenerateContentResponseRaw = response
            .json()
            .await
            .map_err(|e| GeminiError::Parse(e.to_string()))?;

        let parsed = parse_response(raw)?;

        debug!(
            model = %model,
            duration_ms = start.elapsed().as_millis(),
            finish_reason = ?parsed.finish_reason,
            "Gemini generate content"
        );

        Ok(parsed)
    }
}

fn parse_response(raw: types::GenerateContentResponseRaw) -> Result<GenerateContentResponse> {
    let block_reason = raw.prompt_feedback.and_then(|f| f.block_reason);

    let candidate = match raw.candidates.into_iter().next() {
        Some(candidate) => candidate,
        None => {
            let reason = block_reason
                .map(|r| format!("prompt blocked: {}", r))
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(GeminiError::EmptyResponse(reason));
        }
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GeminiError::EmptyResponse(format!(
            "candidate has no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(GenerateContentResponse {
        text,
        finish_reason: candidate.finish_reason,
        usage: raw.usage_metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> types::GenerateContentResponseRaw {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_client_builder() {
        let client = GeminiClient::new("key-test")
            .with_base_url("https://proxy.example.com/v1beta/")
            .with_timeout(Duration::from_secs(30));

        assert_eq!(client.base_url(), "https://proxy.example.com/v1beta");
        assert_eq!(client.timeout, Some(Duration::from_secs(30)));
        assert_eq!(client.api_key.expose_secret(), "key-test");
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = GeminiClient::new("super-secret");
        let debug = format!("{:?}", client);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_parse_response_joins_parts() {
        let parsed = parse_response(raw(
            r#"{
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "Imagen 1:\n"}, {"text": "Puntuación Individual (0-10): 7"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 300, "candidatesTokenCount": 120, "totalTokenCount": 420}
            }"#,
        ))
        .unwrap();

        assert_eq!(parsed.text, "Imagen 1:\nPuntuación Individual (0-10): 7");
        assert_eq!(parsed.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(parsed.usage.unwrap().total_token_count, 420);
    }

    #[test]
    fn test_parse_response_blocked_prompt() {
        let err = parse_response(raw(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#))
            .unwrap_err();

        match err {
            GeminiError::EmptyResponse(reason) => assert!(reason.contains("SAFETY")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_response_empty_candidate() {
        let err = parse_response(raw(
            r#"{"candidates": [{"content": {"parts": []}, "finishReason": "MAX_TOKENS"}]}"#,
        ))
        .unwrap_err();

        assert!(matches!(err, GeminiError::EmptyResponse(ref r) if r.contains("MAX_TOKENS")));
    }
}
