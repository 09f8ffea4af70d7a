//! Chunked upload of one artifact
//!
//! Start, a signed URL per chunk, a PUT per chunk, Complete. The four phases
//! form one unit: a failed attempt is retried from Start with a fresh
//! upload id, never resumed chunk by chunk.

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use flightdeck_core::config::UploadConfig;
use flightdeck_core::Preview;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::traits::{PartUploader, PreviewsService};
use crate::types::{GenerateUrlRequest, StartUploadRequest, UploadSession};

/// Fraction reported once Start succeeded
pub const PROGRESS_STARTED: f64 = 0.1;

/// Fraction reached once every chunk is uploaded
pub const PROGRESS_PARTS_DONE: f64 = 0.8;

/// Progress callback receiving fractions in `[0, 1]`
pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Chunking and retry knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSettings {
    pub chunk_size: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl From<&UploadConfig> for UploadSettings {
    fn from(config: &UploadConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

/// Drops reports that would move progress backwards.
///
/// A retry restarts the phase fractions from zero; callers only ever see
/// the high-water mark.
struct MonotonicProgress<'a> {
    inner: ProgressFn<'a>,
    high: Mutex<f64>,
}

impl<'a> MonotonicProgress<'a> {
    fn new(inner: ProgressFn<'a>) -> Self {
        Self {
            inner,
            high: Mutex::new(0.0),
        }
    }

    fn report(&self, value: f64) {
        let value = value.clamp(0.0, 1.0);
        if let Ok(mut high) = self.high.lock() {
            if value > *high {
                *high = value;
                (self.inner)(value);
            }
        }
    }
}

/// Uploads a single file through the multipart protocol
#[derive(Clone)]
pub struct ArtifactMultipartUploader {
    service: Arc<dyn PreviewsService>,
    parts: Arc<dyn PartUploader>,
    settings: UploadSettings,
}

impl ArtifactMultipartUploader {
    pub fn new(
        service: Arc<dyn PreviewsService>,
        parts: Arc<dyn PartUploader>,
        settings: UploadSettings,
    ) -> Self {
        Self {
            service,
            parts,
            settings,
        }
    }

    /// Upload `path`, retrying the whole sequence on retryable failures
    pub async fn upload(
        &self,
        path: &Path,
        start: &StartUploadRequest,
        progress: ProgressFn<'_>,
    ) -> Result<Preview> {
        let size = tokio::fs::metadata(path).await?.len();
        if size == 0 {
            return Err(StoreError::InvalidArtifact(format!(
                "{} is empty",
                path.display()
            )));
        }

        let progress = MonotonicProgress::new(progress);
        let max_retries = self.settings.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            match self.upload_once(path, size, start, &progress).await {
                Ok(preview) => {
                    progress.report(1.0);
                    info!(preview_id = %preview.id, attempt = attempt + 1, "upload complete");
                    return Ok(preview);
                }
                Err(e) => {
                    if e.is_retryable() && attempt < max_retries {
                        let delay = self.settings.retry_delay_ms * (attempt + 1) as u64;
                        warn!(
                            "Upload attempt {} failed ({}), retrying in {}ms...",
                            attempt + 1,
                            e,
                            delay
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        last_error = Some(e);
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| StoreError::Other("upload was not attempted".to_string())))
    }

    async fn upload_once(
        &self,
        path: &Path,
        size: u64,
        start: &StartUploadRequest,
        progress: &MonotonicProgress<'_>,
    ) -> Result<Preview> {
        let started = self.service.start_upload(start).await?;
        debug!(app_build_id = %started.app_build_id, upload_id = %started.upload_id, "upload started");
        progress.report(PROGRESS_STARTED);

        let chunk_size = self.settings.chunk_size.max(1);
        let total_parts = size.div_ceil(chunk_size).max(1);
        let mut session = UploadSession::new(started);
        let mut file = tokio::fs::File::open(path).await?;

        loop {
            let chunk = read_chunk(&mut file, chunk_size).await?;
            if chunk.is_empty() {
                break;
            }

            let part_number = session.next_part_number();
            let url = self
                .service
                .generate_upload_url(&GenerateUrlRequest {
                    app_build_id: session.app_build_id.clone(),
                    part_number,
                    upload_id: session.upload_id.clone(),
                    full_handle: start.full_handle.clone(),
                    content_length: chunk.len() as u64,
                })
                .await?;

            let etag = self
                .parts
                .put(&url, chunk, "application/octet-stream")
                .await
                .map_err(|e| StoreError::PartUploadFailed {
                    part_number,
                    message: e.to_string(),
                })?
                .ok_or(StoreError::MissingEtag { part_number })?;

            session.record(etag);
            debug!(part_number, total_parts, "part uploaded");

            let fraction = part_number as f64 / total_parts as f64;
            progress.report(
                PROGRESS_STARTED + (PROGRESS_PARTS_DONE - PROGRESS_STARTED) * fraction.min(1.0),
            );
        }

        self.service
            .complete_upload(&session.into_complete_request(&start.full_handle))
            .await
    }
}

/// Read up to `chunk_size` bytes, short only at end of file
async fn read_chunk(file: &mut tokio::fs::File, chunk_size: u64) -> Result<Vec<u8>> {
    let mut chunk = Vec::new();
    file.take(chunk_size).read_to_end(&mut chunk).await?;
    Ok(chunk)
}
