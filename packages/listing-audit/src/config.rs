//! Startup configuration.
//!
//! Defaults reproduce the original batch: listings `coches_elia_1.xml` ..
//! `coches_elia_103.xml` in the working directory, reports written as
//! `analisis_fotos_coche_flash_<id>.txt`.

use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::fetcher::RetryPolicy;
use crate::types::ListingId;

/// Batch configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditConfig {
    /// Directory holding the listing documents
    pub document_dir: PathBuf,
    /// Document file stem prefix (`<prefix>_<id>.xml`)
    pub document_prefix: String,
    /// Report path prefix (`<prefix><id>.txt`); may include directories
    pub output_prefix: String,
    /// Directory for downloaded images; removed at the end of the run
    pub staging_dir: PathBuf,
    pub id_range_start: ListingId,
    pub id_range_end: ListingId,
    pub download_timeout_secs: u64,
    /// Extra attempts after the first failed download
    pub download_max_retries: u32,
    pub download_retry_delay_secs: u64,
    /// Remote model name
    pub model: String,
    pub max_output_tokens: u32,
    pub scoring_timeout_secs: u64,
    /// Images processed concurrently within one listing (1 = sequential)
    pub max_concurrent_images: usize,
    /// Optional cap on remote scoring calls per minute
    pub scoring_requests_per_minute: Option<u32>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            document_dir: PathBuf::from("."),
            document_prefix: "coches_elia".to_string(),
            output_prefix: "analisis_fotos_coche_flash_".to_string(),
            staging_dir: PathBuf::from("temp_car_images"),
            id_range_start: 1,
            id_range_end: 103,
            download_timeout_secs: 15,
            download_max_retries: 2,
            download_retry_delay_secs: 5,
            model: "gemini-2.0-flash".to_string(),
            max_output_tokens: 1500,
            scoring_timeout_secs: 120,
            max_concurrent_images: 1,
            scoring_requests_per_minute: None,
        }
    }
}

impl AuditConfig {
    /// Load configuration from `LISTING_AUDIT_*` environment variables,
    /// falling back to defaults for anything unset.
    ///
    /// Only parse errors are reported here. Call [`validate`](Self::validate)
    /// once any overrides have been applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = Self::default();

        let config = Self {
            document_dir: env::var("LISTING_AUDIT_DOCUMENT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.document_dir),
            document_prefix: env::var("LISTING_AUDIT_DOCUMENT_PREFIX")
                .unwrap_or(defaults.document_prefix),
            output_prefix: env::var("LISTING_AUDIT_OUTPUT_PREFIX")
                .unwrap_or(defaults.output_prefix),
            staging_dir: env::var("LISTING_AUDIT_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            id_range_start: parse_var("LISTING_AUDIT_ID_START")?.unwrap_or(defaults.id_range_start),
            id_range_end: parse_var("LISTING_AUDIT_ID_END")?.unwrap_or(defaults.id_range_end),
            download_timeout_secs: parse_var("LISTING_AUDIT_DOWNLOAD_TIMEOUT_SECS")?
                .unwrap_or(defaults.download_timeout_secs),
            download_max_retries: parse_var("LISTING_AUDIT_DOWNLOAD_MAX_RETRIES")?
                .unwrap_or(defaults.download_max_retries),
            download_retry_delay_secs: parse_var("LISTING_AUDIT_DOWNLOAD_RETRY_DELAY_SECS")?
                .unwrap_or(defaults.download_retry_delay_secs),
            model: env::var("LISTING_AUDIT_MODEL").unwrap_or(defaults.model),
            max_output_tokens: parse_var("LISTING_AUDIT_MAX_OUTPUT_TOKENS")?
                .unwrap_or(defaults.max_output_tokens),
            scoring_timeout_secs: parse_var("LISTING_AUDIT_SCORING_TIMEOUT_SECS")?
                .unwrap_or(defaults.scoring_timeout_secs),
            max_concurrent_images: parse_var("LISTING_AUDIT_MAX_CONCURRENT_IMAGES")?
                .unwrap_or(defaults.max_concurrent_images),
            scoring_requests_per_minute: parse_var("LISTING_AUDIT_SCORING_RPM")?,
        };

        Ok(config)
    }

    /// Reject configurations the batch cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id_range_start > self.id_range_end {
            return Err(ConfigError::EmptyRange {
                start: self.id_range_start,
                end: self.id_range_end,
            });
        }
        if self.download_timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "download_timeout_secs",
            });
        }
        if self.scoring_timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "scoring_timeout_secs",
            });
        }
        if self.max_concurrent_images == 0 {
            return Err(ConfigError::Zero {
                field: "max_concurrent_images",
            });
        }
        if self.scoring_requests_per_minute == Some(0) {
            return Err(ConfigError::Zero {
                field: "scoring_requests_per_minute",
            });
        }
        Ok(())
    }

    /// Path of the listing document for `id`.
    pub fn document_path(&self, id: ListingId) -> PathBuf {
        self.document_dir
            .join(format!("{}_{}.xml", self.document_prefix, id))
    }

    /// File name of the listing document for `id`, as shown in reports.
    pub fn document_name(&self, id: ListingId) -> String {
        format!("{}_{}.xml", self.document_prefix, id)
    }

    /// Path of the report for `id`.
    pub fn report_path(&self, id: ListingId) -> PathBuf {
        PathBuf::from(format!("{}{}.txt", self.output_prefix, id))
    }

    pub fn ids(&self) -> std::ops::RangeInclusive<ListingId> {
        self.id_range_start..=self.id_range_end
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn scoring_timeout(&self) -> Duration {
        Duration::from_secs(self.scoring_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.download_max_retries,
            Duration::from_secs(self.download_retry_delay_secs),
        )
    }
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}
