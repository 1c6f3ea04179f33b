//! Run orchestration.
//!
//! Rendered fetch first, static fetch as fallback, then acquisition and a
//! single metadata write. Stage failures end in a logged, graceful summary
//! rather than an error.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::acquisition::engine::{AcquisitionEngine, OutcomeCounts};
use crate::acquisition::http_client::HttpClient;
use crate::acquisition::page_fetcher::{fetch_rendered, PageFetcher, RawDocument};
use crate::config::HarvestConfig;
use crate::error::FetchError;
use crate::extraction::{
    categorize, category::candidate_count, extract_document, CategorizedCandidates,
    ExtractionVariant,
};
use crate::metadata::RecordLog;
use crate::progress::{EventEmitter, HarvestEventKind, ProgressSender, Stage};
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;

/// Which fetch produced the harvested candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Rendered,
    Static,
    /// Neither fetch yielded a categorized image.
    None,
}

/// What a run did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub target_url: String,
    pub started_at: DateTime<Utc>,
    pub strategy: Strategy,
    pub categories: usize,
    pub candidates: usize,
    pub counts: OutcomeCounts,
    pub metadata_path: Option<PathBuf>,
    /// A shutdown signal interrupted acquisition.
    pub cancelled: bool,
    pub duration_ms: u64,
}

/// Drives one harvest of one target page.
pub struct Harvester {
    config: HarvestConfig,
    client: HttpClient,
    renderer: Option<Box<dyn Renderer>>,
    events: EventEmitter,
    shutdown: Arc<Notify>,
}

impl Harvester {
    pub fn new(config: HarvestConfig) -> Result<Self, FetchError> {
        let client = HttpClient::new(&config.client)?;
        let run_id = uuid::Uuid::new_v4().to_string();
        Ok(Self {
            config,
            client,
            renderer: None,
            events: EventEmitter::new(None, run_id),
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Use `renderer` for the rendered fetch instead of launching Chromium.
    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Broadcast progress events on `tx`.
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        let run_id = self.events.run_id().to_string();
        self.events = EventEmitter::new(Some(tx), run_id);
        self
    }

    /// Get the shutdown notifier (for external shutdown signaling).
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Run the whole pipeline. Never fails; problems are logged and
    /// reflected in the summary.
    pub async fn run(mut self) -> RunSummary {
        let start = Instant::now();
        info!("harvesting {}", self.config.target_url);

        let mut summary = RunSummary {
            run_id: self.events.run_id().to_string(),
            target_url: self.config.target_url.to_string(),
            started_at: Utc::now(),
            strategy: Strategy::None,
            categories: 0,
            candidates: 0,
            counts: OutcomeCounts::default(),
            metadata_path: None,
            cancelled: false,
            duration_ms: 0,
        };

        let Some((strategy, categorized)) = self.discover().await else {
            info!("no images found");
            summary.duration_ms = start.elapsed().as_millis() as u64;
            return summary;
        };

        summary.strategy = strategy;
        summary.categories = categorized.len();
        summary.candidates = candidate_count(&categorized);
        for (category, candidates) in &categorized {
            info!("- {category}: {} images", candidates.len());
        }
        self.events.emit(HarvestEventKind::CandidatesDiscovered {
            categories: summary.categories as u32,
            candidates: summary.candidates as u32,
        });

        let log = RecordLog::new();
        let engine = AcquisitionEngine::from_config(self.client.clone(), &self.config);
        let stage_start = Instant::now();
        self.stage_started(Stage::Acquisition, format!("{} images", summary.candidates));
        let report = engine
            .acquire_until(&categorized, &log, &self.events, &self.shutdown)
            .await;
        summary.counts = report.counts;
        summary.cancelled = report.cancelled;
        self.stage_completed(
            Stage::Acquisition,
            format!(
                "{} succeeded, {} failed, {} skipped",
                report.counts.succeeded, report.counts.failed, report.counts.skipped
            ),
            stage_start,
        );

        let stage_start = Instant::now();
        match log.persist(&self.config.output_root) {
            Ok(Some(path)) => {
                self.stage_completed(Stage::Metadata, path.display().to_string(), stage_start);
                summary.metadata_path = Some(path);
            }
            Ok(None) => self.stage_skipped(Stage::Metadata, "no images saved"),
            Err(e) => {
                error!("failed to write metadata: {e}");
                self.stage_skipped(Stage::Metadata, &e.to_string());
            }
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        summary
    }

    /// Find categorized candidates: rendered page first, static fallback.
    async fn discover(&mut self) -> Option<(Strategy, CategorizedCandidates)> {
        if self.config.static_only {
            self.stage_skipped(Stage::RenderedFetch, "static-only run");
        } else {
            match self.rendered_document().await {
                Ok(document) => {
                    let categorized = self.categorize(&document, ExtractionVariant::Rendered);
                    if !categorized.is_empty() {
                        return Some((Strategy::Rendered, categorized));
                    }
                    self.fallback("rendered page yielded no images".to_string());
                }
                Err(e) => {
                    self.stage_skipped(Stage::RenderedFetch, &e.to_string());
                    self.fallback(format!("rendered fetch failed ({e})"));
                }
            }
        }

        let stage_start = Instant::now();
        self.stage_started(Stage::StaticFetch, self.config.target_url.to_string());
        let fetcher = PageFetcher::new(self.client.clone());
        let document = match fetcher.fetch_static(&self.config.target_url).await {
            Ok(document) => document,
            Err(e) => {
                error!("static fetch failed: {e}");
                self.stage_skipped(Stage::StaticFetch, &e.to_string());
                return None;
            }
        };
        self.stage_completed(
            Stage::StaticFetch,
            format!("{} bytes", document.html.len()),
            stage_start,
        );

        let categorized = self.categorize(&document, ExtractionVariant::Static);
        if categorized.is_empty() {
            None
        } else {
            Some((Strategy::Static, categorized))
        }
    }

    async fn rendered_document(&mut self) -> Result<RawDocument, FetchError> {
        let stage_start = Instant::now();
        self.stage_started(Stage::RenderedFetch, self.config.target_url.to_string());

        let renderer: Box<dyn Renderer> = match self.renderer.take() {
            Some(renderer) => renderer,
            None => Box::new(
                ChromiumRenderer::launch(&self.config.render)
                    .await
                    .map_err(|e| FetchError::DriverFailure(format!("{e:#}")))?,
            ),
        };

        let document = fetch_rendered(
            renderer,
            &self.config.target_url,
            &self.config.render,
            self.config.page_source_path.as_deref(),
        )
        .await?;

        self.stage_completed(
            Stage::RenderedFetch,
            format!("{} bytes", document.html.len()),
            stage_start,
        );
        Ok(document)
    }

    fn categorize(
        &self,
        document: &RawDocument,
        variant: ExtractionVariant,
    ) -> CategorizedCandidates {
        let stage_start = Instant::now();
        self.stage_started(Stage::Extraction, format!("{variant:?}"));
        let report = extract_document(document, variant);
        let categorized = categorize(report.candidates);
        self.stage_completed(
            Stage::Extraction,
            format!("{} categories", categorized.len()),
            stage_start,
        );
        categorized
    }

    fn fallback(&self, reason: String) {
        warn!("{reason}, falling back to static fetch");
        self.events.emit(HarvestEventKind::Warning {
            message: format!("{reason}, falling back to static fetch"),
        });
    }

    fn stage_started(&self, stage: Stage, message: String) {
        self.events
            .emit(HarvestEventKind::StageStarted { stage, message });
    }

    fn stage_completed(&self, stage: Stage, message: String, since: Instant) {
        self.events.emit(HarvestEventKind::StageCompleted {
            stage,
            message,
            duration_ms: since.elapsed().as_millis() as u64,
        });
    }

    fn stage_skipped(&self, stage: Stage, reason: &str) {
        self.events.emit(HarvestEventKind::StageSkipped {
            stage,
            reason: reason.to_string(),
        });
    }
}
