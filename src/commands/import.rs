//! Batch import of a directory into the knowledge base.
//!
//! Walks one directory level, extracts text per file kind and runs the
//! ingestion pipeline, paced by a token-bucket rate limiter. Rate-limit
//! errors skip the item, never the batch.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{error, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::knowledge::record::SourceType;
use crate::media::MediaExtractor;
use crate::pipeline::{IngestError, IngestPipeline};
use crate::ratelimit::RateLimiter;

/// Outcome counts for one import run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub rate_limited: usize,
}

/// Import every supported file in `directory` (non-recursive).
pub async fn run(
    directory: &Path,
    media: &MediaExtractor,
    ingest: &IngestPipeline,
    limiter: &RateLimiter,
) -> Result<ImportSummary> {
    run_with(directory, media, limiter, |text, source| async move {
        ingest
            .ingest(&text, source)
            .await
            .map(|stored| stored.id)
    })
    .await
}

/// Import with an injectable ingestion step, so tests can run without
/// live services.
pub async fn run_with<F, Fut>(
    directory: &Path,
    media: &MediaExtractor,
    limiter: &RateLimiter,
    ingest_fn: F,
) -> Result<ImportSummary>
where
    F: Fn(String, SourceType) -> Fut,
    Fut: Future<Output = Result<Uuid, IngestError>>,
{
    anyhow::ensure!(
        directory.is_dir(),
        "'{}' is not a directory",
        directory.display()
    );

    let mut files: Vec<PathBuf> = WalkDir::new(directory)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();

    let total = files.len();
    info!(
        "Starting bulk import of {} files from '{}'",
        total,
        directory.display()
    );

    let mut summary = ImportSummary::default();

    for (index, path) in files.iter().enumerate() {
        info!(
            "--- Processing file {}/{}: {} ---",
            index + 1,
            total,
            path.display()
        );

        limiter.acquire().await;

        let extracted = match media.extract(path).await {
            Ok(Some(extracted)) => extracted,
            Ok(None) => {
                warn!("Unsupported file type: {}. Skipping.", path.display());
                summary.skipped += 1;
                continue;
            }
            Err(e) if e.is_rate_limit() => {
                error!("Rate limited while reading {}. Skipping.", path.display());
                summary.rate_limited += 1;
                continue;
            }
            Err(e) => {
                error!("Failed to extract text from {}: {}", path.display(), e);
                summary.failed += 1;
                continue;
            }
        };

        if extracted.text.trim().is_empty() {
            error!("No text could be extracted from {}", path.display());
            summary.failed += 1;
            continue;
        }

        match ingest_fn(extracted.text, extracted.source_type).await {
            Ok(id) => {
                info!("Stored {} with ID: {}", path.display(), id);
                summary.succeeded += 1;
            }
            Err(e) if e.is_rate_limit() => {
                error!("Rate limited while processing {}. Skipping.", path.display());
                summary.rate_limited += 1;
            }
            Err(e) => {
                error!("Failed to ingest {}: {}", path.display(), e);
                summary.failed += 1;
            }
        }
    }

    info!("{}", summary.report());
    Ok(summary)
}

impl ImportSummary {
    /// Human-readable run report.
    pub fn report(&self) -> String {
        format!(
            "Bulk Import Summary\n\
             \x20 Successfully processed: {} files\n\
             \x20 Failed to process: {} files\n\
             \x20 Skipped (unsupported): {} files\n\
             \x20 Skipped (rate limited): {} files",
            self.succeeded, self.failed, self.skipped, self.rate_limited
        )
    }
}
