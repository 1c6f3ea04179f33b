//! Async HTTP client wrapping reqwest.
//!
//! Not a browser, just HTTP requests with browser-like headers. Handles
//! redirects, timeouts, retry with exponential backoff on the configured
//! status set, and `Retry-After` on 429/503.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::config::RetryPolicy;
use crate::error::FetchError;

/// A fully read text response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Original requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Content-Type header, if any.
    pub content_type: Option<String>,
    /// Response body as text.
    pub body: String,
}

/// Pooled HTTP client shared by the page fetcher and the download engine.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for sites that reject HTTP/2.
    h1_client: reqwest::Client,
    retry: RetryPolicy,
    request_timeout: Duration,
    download_timeout: Duration,
}

impl HttpClient {
    /// Build a client from `config`.
    pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
        let headers = header_map(&config.headers);
        let build = |http1_only: bool| {
            let mut builder = reqwest::Client::builder()
                .user_agent(config.user_agent.as_str())
                .default_headers(headers.clone())
                .redirect(reqwest::redirect::Policy::limited(10))
                .pool_max_idle_per_host(config.pool_max_idle_per_host)
                .danger_accept_invalid_certs(!config.verify_tls);
            if http1_only {
                builder = builder.http1_only();
            }
            builder
                .build()
                .map_err(|e| FetchError::Network {
                    url: String::new(),
                    message: format!("failed to build HTTP client: {e}"),
                })
        };

        if !config.verify_tls {
            warn!("TLS certificate verification is disabled");
        }

        Ok(Self {
            client: build(false)?,
            h1_client: build(true)?,
            retry: config.retry.clone(),
            request_timeout: config.request_timeout,
            download_timeout: config.download_timeout,
        })
    }

    /// GET a page and read it as text.
    pub async fn get_text(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let resp = self.get(url, self.request_timeout).await?;
        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let content_type = content_type(&resp);
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        Ok(HttpResponse {
            url: url.to_string(),
            final_url,
            status,
            content_type,
            body,
        })
    }

    /// GET for streaming a download; the body is left unread.
    pub async fn get_download(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        self.get(url, self.download_timeout).await
    }

    /// GET with retry, returning a response with a 2xx status.
    ///
    /// Falls back to HTTP/1.1 on protocol errors (some CDNs reject HTTP/2).
    pub async fn get(&self, url: &str, timeout: Duration) -> Result<reqwest::Response, FetchError> {
        match self.get_inner(&self.client, url, timeout).await {
            Ok(resp) => Ok(resp),
            Err(FetchError::Network { message, .. })
                if message.contains("http2")
                    || message.contains("protocol")
                    || message.contains("connection closed") =>
            {
                debug!("retrying {url} over HTTP/1.1 after: {message}");
                self.get_inner(&self.h1_client, url, timeout).await
            }
            Err(e) => Err(e),
        }
    }

    async fn get_inner(
        &self,
        client: &reqwest::Client,
        url: &str,
        timeout: Duration,
    ) -> Result<reqwest::Response, FetchError> {
        let mut retries = 0u32;

        loop {
            match client.get(url).timeout(timeout).send().await {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if self.retry.retries_status(status) && retries < self.retry.max_retries {
                        retries += 1;
                        let delay = retry_after(&resp)
                            .filter(|_| status == 429 || status == 503)
                            .map(|d| d.min(self.retry.backoff_max))
                            .unwrap_or_else(|| self.retry.backoff(retries));
                        debug!("HTTP {status} from {url}, retry {retries} in {delay:?}");
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    if !resp.status().is_success() {
                        return Err(FetchError::HttpStatus {
                            url: url.to_string(),
                            status,
                        });
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    let transient = e.is_timeout() || e.is_connect() || e.is_request();
                    if transient && retries < self.retry.max_retries {
                        retries += 1;
                        let delay = self.retry.backoff(retries);
                        debug!("request to {url} failed ({e}), retry {retries} in {delay:?}");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(FetchError::from_reqwest(url, &e));
                }
            }
        }
    }
}

/// Content-Type of a response, if present and valid UTF-8.
pub fn content_type(resp: &reqwest::Response) -> Option<String> {
    resp.headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// `Retry-After` in seconds, if the server sent one.
fn retry_after(resp: &reqwest::Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn header_map(headers: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                map.insert(n, v);
            }
            _ => warn!("ignoring invalid header {name:?}"),
        }
    }
    map
}
