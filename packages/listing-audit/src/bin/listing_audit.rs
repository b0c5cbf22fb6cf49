//! Listing photo audit CLI
//!
//! Scores every listing document in the configured id range and writes one
//! report per listing. Settings come from `LISTING_AUDIT_*` environment
//! variables (and `.env`); flags override them.

use anyhow::{Context, Result};
use clap::Parser;
use listing_audit::{
    AuditConfig, BatchRunner, GeminiVisionModel, HttpImageFetcher, ImageScorer, RateLimitedModel,
    VisionModel,
};
use std::num::NonZeroU32;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "listing-audit")]
#[command(about = "Score the advertising quality of classified-listing photos")]
struct Cli {
    /// Directory holding the listing documents
    #[arg(long)]
    document_dir: Option<PathBuf>,

    /// Report path prefix (`<prefix><id>.txt`)
    #[arg(long)]
    output_prefix: Option<String>,

    /// First listing id
    #[arg(long)]
    start: Option<u32>,

    /// Last listing id (inclusive)
    #[arg(long)]
    end: Option<u32>,

    /// Remote model name
    #[arg(long)]
    model: Option<String>,

    /// Images processed concurrently within one listing
    #[arg(long)]
    concurrency: Option<usize>,

    /// Cap on remote scoring calls per minute
    #[arg(long)]
    rpm: Option<u32>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(self, mut config: AuditConfig) -> AuditConfig {
        if let Some(dir) = self.document_dir {
            config.document_dir = dir;
        }
        if let Some(prefix) = self.output_prefix {
            config.output_prefix = prefix;
        }
        if let Some(start) = self.start {
            config.id_range_start = start;
        }
        if let Some(end) = self.end {
            config.id_range_end = end;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(concurrency) = self.concurrency {
            config.max_concurrent_images = concurrency;
        }
        if self.rpm.is_some() {
            config.scoring_requests_per_minute = self.rpm;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,listing_audit=info,gemini_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    let config = AuditConfig::from_env().context("Failed to load configuration")?;
    let config = cli.apply(config);
    config.validate().context("Invalid configuration")?;
    tracing::info!(
        documents = %config.document_dir.display(),
        start = config.id_range_start,
        end = config.id_range_end,
        "Configuration loaded"
    );

    let gemini = GeminiVisionModel::from_env(&config)
        .context("Failed to initialise the scoring model (is GEMINI_API_KEY set?)")?;
    let model: Box<dyn VisionModel> = match config.scoring_requests_per_minute.and_then(NonZeroU32::new) {
        Some(rpm) => {
            tracing::info!(rpm = rpm.get(), "Rate limiting scoring calls");
            Box::new(RateLimitedModel::per_minute(gemini, rpm))
        }
        None => Box::new(gemini),
    };

    let fetcher = HttpImageFetcher::new(config.download_timeout())
        .context("Failed to build HTTP client")?
        .retrying(config.retry_policy());
    let scorer = ImageScorer::new(model, config.scoring_timeout());

    let runner = BatchRunner::new(config, fetcher, scorer);
    let summary = runner.run().await.context("Listing audit aborted")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    if summary.failed > 0 {
        tracing::warn!(
            failed = ?summary.failed_listings(),
            "Some listings could not be persisted"
        );
        // Reports that could not be written go to stdout instead
        if !json {
            for failure in &summary.failures {
                if let Some(report) = &failure.report {
                    println!("{}", report);
                }
            }
        }
    }

    Ok(())
}
