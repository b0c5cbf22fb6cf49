//! Batch driver.
//!
//! Walks the configured id range. Per listing:
//!
//! ```text
//! PENDING -> SKIPPED                      (document missing)
//! PENDING -> PARSED -> DOWNLOADING/SCORING (per image) -> AGGREGATED -> PERSISTED -> CLEANED
//! ```
//!
//! Image failures degrade that image's analysis to a sentinel and never
//! change the listing's transitions. A report that cannot be written fails
//! the listing, not the batch.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::AuditConfig;
use crate::error::{AuditError, Result};
use crate::fetcher::ImageFetcher;
use crate::parser::image_references;
use crate::report::{aggregate, ListingReport};
use crate::scorer::{prompts, ImageScorer, VisionModel};
use crate::staging::StagingArea;
use crate::types::{AnalysisOutcome, ImageAnalysis, ImageReference, ListingId};

/// Result of processing one listing id.
#[derive(Debug, Clone)]
pub enum ListingOutcome {
    /// No document for this id
    Skipped,
    /// Report written to `path`
    Persisted { path: PathBuf, report: ListingReport },
}

/// A listing that was analyzed but not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ListingFailure {
    pub listing_id: ListingId,
    pub error: String,
    /// Rendered report, when the failure happened after aggregation
    pub report: Option<String>,
}

impl ListingFailure {
    fn from_error(listing_id: ListingId, error: AuditError) -> Self {
        let message = error.to_string();
        let report = match error {
            AuditError::Persist { report, .. } => Some(report),
            _ => None,
        };
        Self {
            listing_id,
            error: message,
            report,
        }
    }
}

/// Counters for a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<ListingFailure>,
    pub images_analyzed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchSummary {
    fn started(started_at: DateTime<Utc>) -> Self {
        Self {
            processed: 0,
            skipped: 0,
            failed: 0,
            failures: Vec::new(),
            images_analyzed: 0,
            started_at,
            finished_at: started_at,
        }
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn failed_listings(&self) -> Vec<ListingId> {
        self.failures.iter().map(|failure| failure.listing_id).collect()
    }
}

/// Drives parser, fetcher, scorer and aggregator over the id range.
pub struct BatchRunner<F: ImageFetcher, M: VisionModel> {
    config: AuditConfig,
    fetcher: F,
    scorer: ImageScorer<M>,
    staging: StagingArea,
}

impl<F: ImageFetcher, M: VisionModel> BatchRunner<F, M> {
    pub fn new(config: AuditConfig, fetcher: F, scorer: ImageScorer<M>) -> Self {
        let staging = StagingArea::new(config.staging_dir.clone());
        Self {
            config,
            fetcher,
            scorer,
            staging,
        }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Process every id in the configured range.
    ///
    /// Only a staging directory that cannot be created aborts the run.
    pub async fn run(&self) -> Result<BatchSummary> {
        let mut summary = BatchSummary::started(Utc::now());

        self.ensure_staging().await?;

        info!(
            start = self.config.id_range_start,
            end = self.config.id_range_end,
            model = self.scorer.model().name(),
            concurrency = self.config.max_concurrent_images,
            "Starting listing audit"
        );

        for listing_id in self.config.ids() {
            match self.process_listing(listing_id).await {
                Ok(ListingOutcome::Skipped) => summary.skipped += 1,
                Ok(ListingOutcome::Persisted { path, report }) => {
                    summary.processed += 1;
                    summary.images_analyzed += report.image_count;
                    info!(
                        listing_id,
                        path = %path.display(),
                        images = report.image_count,
                        global_score = ?report.global_score,
                        "Report written"
                    );
                }
                Err(e) => {
                    error!(listing_id, error = %e, "Listing failed");
                    summary.failed += 1;
                    summary.failures.push(ListingFailure::from_error(listing_id, e));
                }
            }
        }

        self.staging.remove_all().await;

        summary.finished_at = Utc::now();
        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            images = summary.images_analyzed,
            elapsed_secs = summary.elapsed().num_seconds(),
            "Listing audit complete"
        );

        Ok(summary)
    }

    /// Process a single listing id end to end.
    ///
    /// Creates the staging directory if needed, so it can be called outside
    /// [`run`](Self::run).
    pub async fn process_listing(&self, listing_id: ListingId) -> Result<ListingOutcome> {
        let document_path = self.config.document_path(listing_id);

        if !tokio::fs::try_exists(&document_path).await.unwrap_or(false) {
            warn!(
                listing_id,
                path = %document_path.display(),
                "Listing document not found, skipping"
            );
            return Ok(ListingOutcome::Skipped);
        }

        info!(listing_id, path = %document_path.display(), "Processing listing");

        self.ensure_staging().await?;

        let bytes = tokio::fs::read(&document_path)
            .await
            .map_err(|source| AuditError::ReadDocument {
                listing_id,
                path: document_path.clone(),
                source,
            })?;
        let markup = String::from_utf8_lossy(&bytes);

        let references = image_references(&markup);
        if references.is_empty() {
            info!(listing_id, "No unique image URLs found");
        } else {
            info!(listing_id, images = references.len(), "Analyzing images");
        }

        let analyses = self.analyze_images(listing_id, &references).await;
        let report = aggregate(&self.config.document_name(listing_id), analyses);

        let path = self.persist(listing_id, &report).await?;

        let removed = self.staging.clear_listing(listing_id).await;
        if removed > 0 {
            info!(listing_id, removed, "Staged images removed");
        }

        Ok(ListingOutcome::Persisted { path, report })
    }

    async fn ensure_staging(&self) -> Result<()> {
        self.staging
            .ensure()
            .await
            .map_err(|source| AuditError::Staging {
                path: self.staging.root().to_path_buf(),
                source,
            })
    }

    /// Analyze every image, at most `max_concurrent_images` at a time.
    ///
    /// Completion order is irrelevant; the result is sorted by position.
    async fn analyze_images(
        &self,
        listing_id: ListingId,
        references: &[ImageReference],
    ) -> Vec<ImageAnalysis> {
        let total = references.len();

        let mut analyses: Vec<ImageAnalysis> = stream::iter(references)
            .map(|reference| self.analyze_image(listing_id, reference, total))
            .buffer_unordered(self.config.max_concurrent_images.max(1))
            .collect()
            .await;

        analyses.sort_by_key(|analysis| analysis.position);
        analyses
    }

    /// Download, then score. The download always completes first.
    async fn analyze_image(
        &self,
        listing_id: ListingId,
        reference: &ImageReference,
        total: usize,
    ) -> ImageAnalysis {
        let number = reference.number();
        let dest = self.staging.image_path(listing_id, reference.position);

        info!(
            listing_id,
            image = number,
            total,
            url = %reference.url,
            "Downloading and analyzing image"
        );

        match self.fetcher.fetch(&reference.url, &dest).await {
            Ok(staged) => self
                .scorer
                .score(&staged.path, &reference.url, number)
                .await
                .into_analysis(reference),
            Err(e) => {
                warn!(
                    listing_id,
                    image = number,
                    url = %reference.url,
                    error = %e,
                    "Image download failed, analysis skipped"
                );
                ImageAnalysis {
                    position: reference.position,
                    url: reference.url.clone(),
                    text: prompts::download_failure_analysis(number),
                    rating: 0.0,
                    outcome: AnalysisOutcome::DownloadFailed,
                }
            }
        }
    }

    async fn persist(&self, listing_id: ListingId, report: &ListingReport) -> Result<PathBuf> {
        let path = self.config.report_path(listing_id);

        match write_report(&path, &report.text).await {
            Ok(()) => Ok(path),
            Err(source) => {
                error!(
                    listing_id,
                    path = %path.display(),
                    error = %source,
                    "Failed to write report"
                );
                Err(AuditError::Persist {
                    listing_id,
                    path,
                    report: report.text.clone(),
                    source,
                })
            }
        }
    }
}

async fn write_report(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, text.as_bytes()).await
}
