//! `harvest run`: harvest one listing page.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use url::Url;

use super::output;
use crate::config::{parse_size, HarvestConfig, DEFAULT_OUTPUT_DIR, DEFAULT_PAGE_SOURCE};
use crate::harvester::{Harvester, RunSummary};
use crate::progress::{self, HarvestEventKind, ProgressReceiver, Stage};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Listing page to harvest
    pub url: String,

    /// Dataset root; images land in <OUTPUT>/<category>/
    #[arg(long, short, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Resize every saved image to WIDTHxHEIGHT (e.g. 224x224)
    #[arg(long, value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Maximum scroll rounds in the rendered fetch
    #[arg(long, default_value_t = 20)]
    pub max_scrolls: u32,

    /// Concurrent downloads
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Do not verify TLS certificates
    #[arg(long)]
    pub insecure: bool,

    /// Skip the browser and fetch the page over plain HTTP
    #[arg(long)]
    pub static_only: bool,

    /// Where to write the rendered page source
    #[arg(long, default_value = DEFAULT_PAGE_SOURCE)]
    pub page_source: PathBuf,

    /// Do not write the rendered page source
    #[arg(long, conflicts_with = "page_source")]
    pub no_page_source: bool,

    /// Time budget for the rendered fetch, in seconds
    #[arg(long, default_value_t = 180)]
    pub timeout: u64,
}

impl RunArgs {
    /// Build the run configuration.
    pub fn to_config(&self) -> Result<HarvestConfig> {
        let url = Url::parse(self.url.trim())
            .with_context(|| format!("invalid URL {:?}", self.url))?;
        anyhow::ensure!(
            matches!(url.scheme(), "http" | "https"),
            "only http(s) URLs can be harvested, got {url}"
        );

        let mut config = HarvestConfig::new(url);
        config.output_root = self.output.clone();
        config.target_size = self.size;
        config.render.max_scroll_rounds = self.max_scrolls;
        config.render.max_duration = Duration::from_secs(self.timeout);
        config.concurrency = self.concurrency.max(1);
        config.client.verify_tls = !self.insecure;
        config.static_only = self.static_only;
        config.page_source_path = (!self.no_page_source).then(|| self.page_source.clone());
        Ok(config)
    }
}

/// Harvest the page and print a summary.
pub async fn run(args: &RunArgs) -> Result<()> {
    let config = args.to_config()?;
    let harvester = Harvester::new(config).context("failed to set up HTTP client")?;

    let shutdown = harvester.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing up");
            shutdown.notify_one();
        }
    });

    let (tx, rx) = progress::channel();
    let display = output::is_interactive().then(|| tokio::spawn(show_progress(rx)));

    let summary = harvester.with_progress(tx).run().await;
    if let Some(handle) = display {
        let _ = handle.await;
    }

    print_summary(&summary);
    Ok(())
}

/// Drive a spinner through the fetch stages, then a bar over downloads.
async fn show_progress(mut rx: ProgressReceiver) {
    let bar = ProgressBar::new_spinner();
    bar.enable_steady_tick(Duration::from_millis(120));

    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };
        match event.event {
            HarvestEventKind::StageStarted { stage, message } => {
                bar.set_message(format!("{stage}: {message}"));
            }
            HarvestEventKind::StageSkipped { stage, reason } => {
                bar.println(format!("  {stage} skipped: {reason}"));
            }
            HarvestEventKind::CandidatesDiscovered { candidates, .. } => {
                bar.set_length(candidates as u64);
                bar.set_position(0);
                bar.set_style(
                    ProgressStyle::with_template(
                        "  {bar:40.cyan/blue} {pos}/{len} {wide_msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
            }
            HarvestEventKind::CandidateFinished { category, .. } => {
                bar.inc(1);
                bar.set_message(category);
            }
            HarvestEventKind::StageCompleted {
                stage: Stage::Acquisition,
                ..
            } => bar.finish_and_clear(),
            HarvestEventKind::Warning { message } => bar.println(format!("  {message}")),
            HarvestEventKind::StageCompleted { .. } => {}
        }
    }

    bar.finish_and_clear();
}

fn print_summary(summary: &RunSummary) {
    if output::is_json() {
        output::print_json(summary);
        return;
    }
    if output::is_quiet() {
        return;
    }

    if summary.candidates == 0 {
        println!("No images found.");
        return;
    }

    let counts = &summary.counts;
    println!();
    println!("Download Summary:");
    println!("  Strategy:   {:?}", summary.strategy);
    println!("  Categories: {}", summary.categories);
    println!("  Successful: {}", counts.succeeded);
    println!("  Failed:     {}", counts.failed);
    println!("  Skipped:    {}", counts.skipped);
    println!("  Total:      {}", counts.total());
    if let Some(path) = &summary.metadata_path {
        println!("  Metadata:   {}", path.display());
    }
    if summary.cancelled {
        println!("  (interrupted before all downloads finished)");
    }
}
