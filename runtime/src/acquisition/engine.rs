//! Download engine: turns categorized candidates into verified files.
//!
//! Every candidate is isolated. Whatever happens to one download (bad URL,
//! dead host, HTML instead of an image, a broken decode) becomes an
//! `AcquisitionOutcome` and never affects its siblings.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use url::Url;

use super::http_client::{content_type, HttpClient};
use crate::config::HarvestConfig;
use crate::error::DownloadError;
use crate::extraction::url::file_name;
use crate::extraction::{CategorizedCandidates, Category, ImageCandidate};
use crate::metadata::{DownloadRecord, RecordLog};
use crate::progress::{EventEmitter, HarvestEventKind};

/// Write buffer for streamed downloads.
const WRITE_BUFFER: usize = 8 * 1024;

/// Extension given to files whose URL has none.
const DEFAULT_EXTENSION: &str = "jpg";

/// Final state of one candidate.
#[derive(Debug)]
pub enum AcquisitionOutcome {
    Succeeded(DownloadRecord),
    Failed(DownloadError),
    Skipped(DownloadError),
}

/// Outcome without its payload, for counting and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    Succeeded,
    Failed,
    Skipped,
}

impl AcquisitionOutcome {
    fn from_result(result: Result<DownloadRecord, DownloadError>) -> Self {
        match result {
            Ok(record) => AcquisitionOutcome::Succeeded(record),
            Err(e) if e.is_skip() => AcquisitionOutcome::Skipped(e),
            Err(e) => AcquisitionOutcome::Failed(e),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            AcquisitionOutcome::Succeeded(_) => OutcomeKind::Succeeded,
            AcquisitionOutcome::Failed(_) => OutcomeKind::Failed,
            AcquisitionOutcome::Skipped(_) => OutcomeKind::Skipped,
        }
    }
}

/// Outcome tallies for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Succeeded => self.succeeded += 1,
            OutcomeKind::Failed => self.failed += 1,
            OutcomeKind::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

/// Counts plus whether a shutdown signal cut acquisition short.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionReport {
    pub counts: OutcomeCounts,
    pub cancelled: bool,
}

/// Removes a partially written file unless the download completes.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                debug!("could not remove partial file {}: {e}", self.path.display());
            }
        }
    }
}

/// Downloads candidates into `{output_root}/{category}/{filename}`.
#[derive(Clone)]
pub struct AcquisitionEngine {
    client: HttpClient,
    output_root: PathBuf,
    target_size: Option<(u32, u32)>,
    concurrency: usize,
}

impl AcquisitionEngine {
    pub fn new(
        client: HttpClient,
        output_root: impl Into<PathBuf>,
        target_size: Option<(u32, u32)>,
        concurrency: usize,
    ) -> Self {
        Self {
            client,
            output_root: output_root.into(),
            target_size,
            concurrency: concurrency.max(1),
        }
    }

    pub fn from_config(client: HttpClient, config: &HarvestConfig) -> Self {
        Self::new(
            client,
            config.output_root.clone(),
            config.target_size,
            config.concurrency,
        )
    }

    /// Download everything, appending a record per saved file.
    pub async fn acquire(
        &self,
        categorized: &CategorizedCandidates,
        log: &RecordLog,
        events: &EventEmitter,
    ) -> OutcomeCounts {
        let never = Notify::new();
        self.acquire_until(categorized, log, events, &never)
            .await
            .counts
    }

    /// Like [`acquire`](Self::acquire), returning the records instead of
    /// appending them to a shared log.
    pub async fn acquire_collect(
        &self,
        categorized: &CategorizedCandidates,
    ) -> (Vec<DownloadRecord>, OutcomeCounts) {
        let log = RecordLog::new();
        let counts = self
            .acquire(categorized, &log, &EventEmitter::disabled())
            .await;
        (log.into_records(), counts)
    }

    /// Download until done or until `shutdown` is notified. In-flight
    /// downloads are dropped on shutdown and their partial files removed;
    /// records already appended stay in `log`.
    pub async fn acquire_until(
        &self,
        categorized: &CategorizedCandidates,
        log: &RecordLog,
        events: &EventEmitter,
        shutdown: &Notify,
    ) -> AcquisitionReport {
        let jobs = unique_jobs(categorized);
        info!(
            "downloading {} images across {} categories",
            jobs.len(),
            categorized.len()
        );

        let mut downloads = stream::iter(jobs)
            .map(|(category, candidate)| async move {
                let outcome = self.acquire_one(category, candidate).await;
                (category, candidate, outcome)
            })
            .buffer_unordered(self.concurrency);

        let mut report = AcquisitionReport::default();
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    warn!("shutdown signal received, abandoning remaining downloads");
                    report.cancelled = true;
                    break;
                }
                next = downloads.next() => {
                    let Some((category, candidate, outcome)) = next else {
                        break;
                    };
                    let kind = outcome.kind();
                    report.counts.record(kind);
                    if let AcquisitionOutcome::Succeeded(record) = outcome {
                        log.append(record);
                    }
                    events.emit(HarvestEventKind::CandidateFinished {
                        url: candidate.normalized_url.to_string(),
                        category: category.to_string(),
                        outcome: kind,
                    });
                }
            }
        }

        info!(
            "downloads: {} succeeded, {} failed, {} skipped",
            report.counts.succeeded, report.counts.failed, report.counts.skipped
        );
        report
    }

    /// Acquire a single candidate.
    pub async fn acquire_one(
        &self,
        category: &Category,
        candidate: &ImageCandidate,
    ) -> AcquisitionOutcome {
        let outcome = AcquisitionOutcome::from_result(self.download(category, candidate).await);
        match &outcome {
            AcquisitionOutcome::Succeeded(record) => {
                info!("saved {}/{}", record.category, record.filename)
            }
            AcquisitionOutcome::Skipped(e) => debug!("skipped: {e}"),
            AcquisitionOutcome::Failed(e) => warn!("failed: {e}"),
        }
        outcome
    }

    async fn download(
        &self,
        category: &Category,
        candidate: &ImageCandidate,
    ) -> Result<DownloadRecord, DownloadError> {
        let url = &candidate.normalized_url;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DownloadError::InvalidUrl(url.to_string()));
        }

        let filename = derive_filename(url);
        let dir = self.output_root.join(category.as_str());
        let path = dir.join(&filename);

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(DownloadError::AlreadyExists(path.display().to_string()));
        }

        resolve_host(url).await?;

        let resp = self.client.get_download(url.as_str()).await?;
        let ct = content_type(&resp).unwrap_or_default();
        if !is_image_content_type(&ct) {
            return Err(DownloadError::NonImageContent {
                url: url.to_string(),
                content_type: ct,
            });
        }

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(&dir, e))?;
        let file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(DownloadError::AlreadyExists(path.display().to_string()))
            }
            Err(e) => return Err(io_error(&path, e)),
        };
        let partial = PartialFile::new(path.clone());

        let mut writer = BufWriter::with_capacity(WRITE_BUFFER, file);
        let mut body = resp.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                if e.is_timeout() {
                    DownloadError::Timeout(url.to_string())
                } else {
                    DownloadError::Network {
                        url: url.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| io_error(&path, e))?;
        }
        writer.flush().await.map_err(|e| io_error(&path, e))?;
        drop(writer);

        if let Some((width, height)) = self.target_size {
            // Only this future writes to `path`; the blocking task just encodes.
            let target = path.clone();
            let resized = tokio::task::spawn_blocking(move || {
                harvest_imaging::resize_encoded(&target, width, height)
            })
            .await
            .map_err(|e| io_error(&path, std::io::Error::other(e)))?
            .map_err(|source| DownloadError::Processing {
                path: path.display().to_string(),
                source,
            })?;
            tokio::fs::write(&path, resized)
                .await
                .map_err(|e| io_error(&path, e))?;
        }

        partial.keep();
        Ok(DownloadRecord {
            url: url.to_string(),
            category: category.to_string(),
            filename,
            title: candidate.title_text.clone(),
            alt: candidate.alt_text.clone(),
        })
    }
}

/// Flatten the map into download jobs, dropping URLs already queued under
/// an earlier category.
fn unique_jobs(categorized: &CategorizedCandidates) -> Vec<(&Category, &ImageCandidate)> {
    let mut seen = HashSet::new();
    let mut jobs = Vec::new();
    for (category, candidates) in categorized {
        for candidate in candidates {
            if seen.insert(candidate.normalized_url.as_str()) {
                jobs.push((category, candidate));
            } else {
                debug!("{} already queued", candidate.normalized_url);
            }
        }
    }
    jobs
}

/// File name for a downloaded URL.
///
/// The last path segment (query excluded); a 10-hex-digit SHA-256 prefix of
/// the URL when there is none; `.jpg` appended when the name has no
/// extension.
pub fn derive_filename(url: &Url) -> String {
    let name = match file_name(url) {
        Some(name) => name.to_string(),
        None => {
            let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));
            format!("{}.{DEFAULT_EXTENSION}", &digest[..10])
        }
    };

    if Path::new(&name).extension().is_none() {
        format!("{name}.{DEFAULT_EXTENSION}")
    } else {
        name
    }
}

/// Media types are case-insensitive: `Image/JPEG` is an image.
fn is_image_content_type(content_type: &str) -> bool {
    content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("image/")
}

async fn resolve_host(url: &Url) -> Result<(), DownloadError> {
    let unresolved = || DownloadError::UnresolvedHost(url.to_string());
    let host = url.host_str().ok_or_else(unresolved)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = url.port_or_known_default().unwrap_or(80);

    match tokio::net::lookup_host((host, port)).await {
        Ok(mut addrs) => addrs.next().map(|_| ()).ok_or_else(unresolved),
        Err(_) => Err(unresolved()),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> DownloadError {
    DownloadError::Io {
        path: path.display().to_string(),
        source,
    }
}
