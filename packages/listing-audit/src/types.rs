//! Listing-scoped data types.

use serde::Serialize;
use std::path::PathBuf;

/// Sequence index of a listing document (`<prefix>_<id>.xml`).
pub type ListingId = u32;

/// An image URL and its dense position within the listing (after dedup).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// 0-based position; determines report order
    pub position: usize,
    pub url: String,
}

impl ImageReference {
    pub fn new(position: usize, url: impl Into<String>) -> Self {
        Self {
            position,
            url: url.into(),
        }
    }

    /// 1-based number used in prompts and report text ("Imagen 3").
    pub fn number(&self) -> usize {
        self.position + 1
    }
}

/// A downloaded image sitting in the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedImage {
    pub path: PathBuf,
    pub bytes_written: u64,
}

/// Image bytes ready to send to the remote model.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl EncodedImage {
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            data,
        }
    }
}

/// How an image's analysis was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisOutcome {
    /// Downloaded and scored by the model (rating may still be 0)
    Scored,
    /// Download failed; sentinel analysis
    DownloadFailed,
    /// Decode, remote call or parsing failed; sentinel analysis
    ScoringFailed,
}

/// Exactly one per image reference, including failed ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAnalysis {
    pub position: usize,
    pub url: String,
    pub text: String,
    /// Always within [0, 10]
    pub rating: f64,
    pub outcome: AnalysisOutcome,
}

impl ImageAnalysis {
    pub fn number(&self) -> usize {
        self.position + 1
    }
}
