//! Listing photo audit
//!
//! Batch pipeline that scores the advertising quality of classified-listing
//! photos with a remote multimodal model and writes one report per listing.
//!
//! # Pipeline
//!
//! ```text
//! listing document -> parser -> fetcher (per image) -> scorer (per image) -> report -> file
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use listing_audit::{AuditConfig, BatchRunner, GeminiVisionModel, HttpImageFetcher, ImageScorer};
//!
//! let config = AuditConfig::from_env()?;
//! let model = GeminiVisionModel::from_env(&config)?;
//! let runner = BatchRunner::new(
//!     config.clone(),
//!     HttpImageFetcher::new(config.download_timeout())?.retrying(config.retry_policy()),
//!     ImageScorer::new(model, config.scoring_timeout()),
//! );
//! let summary = runner.run().await;
//! ```
//!
//! # Modules
//!
//! - [`parser`] - Image URL extraction from listing markup
//! - [`fetcher`] - Image downloads with bounded retries
//! - [`staging`] - Local staging directory for downloaded images
//! - [`scorer`] - Remote scoring, prompts and rating extraction
//! - [`report`] - Per-listing aggregation and narrative verdicts
//! - [`pipeline`] - Batch driver over a range of listing ids
//! - [`testing`] - Mock collaborators for tests

pub mod config;
pub mod error;
pub mod fetcher;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod scorer;
pub mod staging;
pub mod testing;
pub mod types;

pub use config::AuditConfig;
pub use error::{AuditError, ConfigError, FetchError, ModelError, Result};
pub use fetcher::{HttpImageFetcher, ImageFetcher, RetryPolicy, RetryingFetcher};
pub use parser::{image_references, parse_image_urls};
pub use pipeline::{BatchRunner, BatchSummary, ListingFailure, ListingOutcome};
pub use report::{aggregate, ListingReport, Verdict};
pub use scorer::{
    extract_rating, GeminiVisionModel, ImageScorer, RateLimitedModel, ScoreOutcome, VisionModel,
};
pub use staging::StagingArea;
pub use types::{AnalysisOutcome, EncodedImage, ImageAnalysis, ImageReference, ListingId, StagedImage};
