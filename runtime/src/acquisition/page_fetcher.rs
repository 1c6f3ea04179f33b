//! Page retrieval: a static HTTP fetch, or a rendered fetch that scrolls a
//! headless browser until lazy content stops loading.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use url::Url;

use super::http_client::HttpClient;
use crate::config::RenderConfig;
use crate::error::FetchError;
use crate::renderer::{RenderContext, Renderer};

/// HTML plus the URL it was retrieved from.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub html: String,
    /// Final URL after redirects (static) or the page's current URL
    /// (rendered). Relative image URLs resolve against this.
    pub url: Url,
}

/// Fetches target pages over the shared HTTP client.
#[derive(Clone)]
pub struct PageFetcher {
    client: HttpClient,
}

impl PageFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Plain GET with browser headers and retry.
    pub async fn fetch_static(&self, url: &Url) -> Result<RawDocument, FetchError> {
        let start = Instant::now();
        let resp = self.client.get_text(url.as_str()).await?;
        let final_url = Url::parse(&resp.final_url).unwrap_or_else(|_| url.clone());

        info!(
            "fetched {} ({} bytes, {}ms)",
            final_url,
            resp.body.len(),
            start.elapsed().as_millis()
        );

        Ok(RawDocument {
            html: resp.body,
            url: final_url,
        })
    }
}

/// Render `url` in a browser, scrolling until the page stops growing.
///
/// Owns the renderer for the duration of the fetch: the context is closed
/// and the renderer shut down on every exit path, including timeout. When
/// `page_source` is set, the snapshot is also written there.
pub async fn fetch_rendered(
    renderer: Box<dyn Renderer>,
    url: &Url,
    config: &RenderConfig,
    page_source: Option<&Path>,
) -> Result<RawDocument, FetchError> {
    let mut ctx = match renderer.new_context().await {
        Ok(ctx) => ctx,
        Err(e) => {
            shutdown(renderer.as_ref()).await;
            return Err(FetchError::DriverFailure(format!("{e:#}")));
        }
    };

    let outcome =
        tokio::time::timeout(config.max_duration, scroll_and_snapshot(ctx.as_mut(), url, config))
            .await;

    if let Err(e) = ctx.close().await {
        warn!("failed to close browser context: {e:#}");
    }
    shutdown(renderer.as_ref()).await;

    let document = match outcome {
        Ok(result) => result?,
        Err(_) => {
            return Err(FetchError::RenderTimeout {
                url: url.to_string(),
                timeout_ms: config.max_duration.as_millis() as u64,
            })
        }
    };

    if let Some(path) = page_source {
        match tokio::fs::write(path, &document.html).await {
            Ok(()) => debug!("page source written to {}", path.display()),
            Err(e) => warn!("could not write page source to {}: {e}", path.display()),
        }
    }

    Ok(document)
}

async fn shutdown(renderer: &dyn Renderer) {
    if let Err(e) = renderer.shutdown().await {
        warn!("browser shutdown failed: {e:#}");
    }
}

fn driver(e: anyhow::Error) -> FetchError {
    FetchError::DriverFailure(format!("{e:#}"))
}

async fn scroll_and_snapshot(
    ctx: &mut dyn RenderContext,
    url: &Url,
    config: &RenderConfig,
) -> Result<RawDocument, FetchError> {
    let start = Instant::now();
    ctx.navigate(url.as_str(), config.navigation_timeout.as_millis() as u64)
        .await
        .map_err(driver)?;
    settle(config.initial_settle).await;

    let mut last_height = ctx.document_height().await.map_err(driver)?;
    let mut stalled = 0u32;
    let mut rounds = 0u32;

    while rounds < config.max_scroll_rounds {
        ctx.scroll_to_bottom().await.map_err(driver)?;
        settle(config.scroll_settle).await;
        rounds += 1;

        let height = ctx.document_height().await.map_err(driver)?;
        if height > last_height {
            debug!("scroll {rounds}: height {last_height} -> {height}");
            last_height = height;
            stalled = 0;
        } else {
            stalled += 1;
            if stalled > config.stall_grace_rounds {
                break;
            }
        }
    }

    let html = ctx.get_html().await.map_err(driver)?;
    let current = ctx.get_url().await.map_err(driver)?;
    let page_url = Url::parse(&current).unwrap_or_else(|_| url.clone());

    info!(
        "rendered {} after {rounds} scrolls ({} bytes, {}ms)",
        page_url,
        html.len(),
        start.elapsed().as_millis()
    );

    Ok(RawDocument {
        html,
        url: page_url,
    })
}

async fn settle(wait: Duration) {
    if !wait.is_zero() {
        tokio::time::sleep(wait).await;
    }
}
