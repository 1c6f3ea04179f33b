//! Run configuration.
//!
//! Everything a run needs is carried in explicit values handed to the
//! components that use them: `ClientConfig` for the HTTP client,
//! `RenderConfig` for the browser path, `HarvestConfig` for the run itself.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Chrome user agent shared by the HTTP client and the browser session.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                              AppleWebKit/537.36 (KHTML, like Gecko) \
                              Chrome/131.0.0.0 Safari/537.36";

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "dataset";

/// Default location of the rendered page-source artifact.
pub const DEFAULT_PAGE_SOURCE: &str = "page_source.html";

/// Env var overriding Chromium discovery.
pub const CHROMIUM_PATH_ENV: &str = "HARVEST_CHROMIUM_PATH";

/// Browser-like request headers sent with every page and image request.
///
/// `Accept-Encoding` is left to reqwest, which negotiates the encodings it
/// can actually decode.
pub fn browser_headers() -> Vec<(String, String)> {
    [
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,\
             image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
        ),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Upgrade-Insecure-Requests", "1"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-User", "?1"),
        (
            "sec-ch-ua",
            "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"131\", \"Google Chrome\";v=\"131\"",
        ),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-ch-ua-platform", "\"macOS\""),
        ("Cache-Control", "max-age=0"),
        ("DNT", "1"),
        ("Referer", "https://www.google.com/"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Retry policy for idempotent GETs.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff_factor * 2^(n-1)`.
    pub backoff_factor: Duration,
    /// Upper bound for any single delay, including `Retry-After`.
    pub backoff_max: Duration,
    /// Status codes that trigger a retry.
    pub status_forcelist: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor: Duration::from_secs(2),
            backoff_max: Duration::from_secs(120),
            status_forcelist: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// Backoff before the `retry`-th retry (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        self.backoff_factor
            .saturating_mul(2u32.pow(exp))
            .min(self.backoff_max)
    }

    /// Whether `status` is in the retry set.
    pub fn retries_status(&self, status: u16) -> bool {
        self.status_forcelist.contains(&status)
    }
}

/// HTTP client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub headers: Vec<(String, String)>,
    pub user_agent: String,
    pub retry: RetryPolicy,
    /// Timeout for page fetches.
    pub request_timeout: Duration,
    /// Timeout for each image download.
    pub download_timeout: Duration,
    /// Verify TLS certificates. Turning this off is an explicit opt-out.
    pub verify_tls: bool,
    /// Idle connections kept per host.
    pub pool_max_idle_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            headers: browser_headers(),
            user_agent: USER_AGENT.to_string(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(30),
            verify_tls: true,
            pool_max_idle_per_host: 10,
        }
    }
}

/// Browser (rendered fetch) settings.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Upper bound on scroll rounds.
    pub max_scroll_rounds: u32,
    /// Wait after navigation before the first scroll.
    pub initial_settle: Duration,
    /// Wait after each scroll before measuring height.
    pub scroll_settle: Duration,
    /// Extra scrolls tried when the height stops growing.
    pub stall_grace_rounds: u32,
    /// Navigation timeout.
    pub navigation_timeout: Duration,
    /// Ceiling for the whole rendered fetch.
    pub max_duration: Duration,
    /// Explicit Chromium binary.
    pub chromium_path: Option<PathBuf>,
    pub window_size: (u32, u32),
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_scroll_rounds: 20,
            initial_settle: Duration::from_secs(5),
            scroll_settle: Duration::from_secs(2),
            stall_grace_rounds: 1,
            navigation_timeout: Duration::from_secs(30),
            max_duration: Duration::from_secs(180),
            chromium_path: std::env::var(CHROMIUM_PATH_ENV).ok().map(PathBuf::from),
            window_size: (1920, 1080),
        }
    }
}

/// Settings for one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub target_url: Url,
    pub output_root: PathBuf,
    /// Resize every saved image to `(width, height)`.
    pub target_size: Option<(u32, u32)>,
    pub client: ClientConfig,
    pub render: RenderConfig,
    /// Concurrent downloads.
    pub concurrency: usize,
    /// Skip the browser and go straight to the static fetch.
    pub static_only: bool,
    /// Where the rendered page source is written, if anywhere.
    pub page_source_path: Option<PathBuf>,
}

impl HarvestConfig {
    /// Defaults for `target_url`.
    pub fn new(target_url: Url) -> Self {
        Self {
            target_url,
            output_root: PathBuf::from(DEFAULT_OUTPUT_DIR),
            target_size: None,
            client: ClientConfig::default(),
            render: RenderConfig::default(),
            concurrency: 4,
            static_only: false,
            page_source_path: Some(PathBuf::from(DEFAULT_PAGE_SOURCE)),
        }
    }
}

/// Parse a `WIDTHxHEIGHT` size such as `224x224`.
pub fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let width: u32 = w
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in {s:?}"))?;
    let height: u32 = h
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in {s:?}"))?;
    if width == 0 || height == 0 {
        return Err(format!("size must be non-zero, got {s:?}"));
    }
    Ok((width, height))
}
