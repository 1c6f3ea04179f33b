//! Error taxonomy for the harvest pipeline.
//!
//! Stage-level failures (`FetchError`) are handled by the harvester, which
//! falls back or ends the run. Per-element (`ExtractionError`) and
//! per-candidate (`DownloadError`) failures never escape their item: they
//! are turned into skips or outcome counts at the narrowest scope.

use harvest_imaging::ImagingError;

/// Failure to retrieve a page, statically or through the browser.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("rendering {url} exceeded {timeout_ms}ms")]
    RenderTimeout { url: String, timeout_ms: u64 },

    #[error("browser driver failure: {0}")]
    DriverFailure(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Classify a transport-level reqwest error.
    pub fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Why an element was passed over during extraction.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("element has no image source")]
    MissingSource,

    #[error("cannot resolve {0:?} to an absolute URL")]
    UnresolvableUrl(String),

    #[error("{0} looks like a non-content asset")]
    FilteredAsset(String),
}

/// Failure to acquire one candidate image.
#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("not an HTTP(S) URL: {0:?}")]
    InvalidUrl(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("could not resolve hostname for {0}")]
    UnresolvedHost(String),

    #[error("network error downloading {url}: {message}")]
    Network { url: String, message: String },

    #[error("download of {0} timed out")]
    Timeout(String),

    #[error("HTTP {status} downloading {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("non-image content at {url} ({content_type})")]
    NonImageContent { url: String, content_type: String },

    #[error("I/O error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("post-processing failed for {path}: {source}")]
    Processing {
        path: String,
        #[source]
        source: ImagingError,
    },
}

impl DownloadError {
    /// Whether this error counts as a skip rather than a failure.
    ///
    /// Skips are conditions where nothing was wrong with the network or
    /// the disk: the URL was not downloadable, the file was already there,
    /// or the server answered with something that is not an image.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            DownloadError::InvalidUrl(_)
                | DownloadError::AlreadyExists(_)
                | DownloadError::NonImageContent { .. }
        )
    }
}

impl From<FetchError> for DownloadError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout { url } | FetchError::RenderTimeout { url, .. } => {
                DownloadError::Timeout(url)
            }
            FetchError::HttpStatus { url, status } => DownloadError::HttpStatus { url, status },
            FetchError::Network { url, message } => DownloadError::Network { url, message },
            FetchError::InvalidUrl(url) => DownloadError::InvalidUrl(url),
            FetchError::DriverFailure(message) => DownloadError::Network {
                url: String::new(),
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_classification() {
        assert!(DownloadError::InvalidUrl("ftp://x".into()).is_skip());
        assert!(DownloadError::AlreadyExists("a/b.jpg".into()).is_skip());
        assert!(DownloadError::NonImageContent {
            url: "https://x/y".into(),
            content_type: "text/html".into(),
        }
        .is_skip());

        assert!(!DownloadError::UnresolvedHost("https://nope.invalid/a.jpg".into()).is_skip());
        assert!(!DownloadError::Timeout("https://x/y".into()).is_skip());
        assert!(!DownloadError::HttpStatus {
            url: "https://x/y".into(),
            status: 404,
        }
        .is_skip());
    }

    #[test]
    fn test_fetch_error_conversion_keeps_status() {
        let err: DownloadError = FetchError::HttpStatus {
            url: "https://x/y.jpg".into(),
            status: 503,
        }
        .into();
        assert!(matches!(err, DownloadError::HttpStatus { status: 503, .. }));
        assert!(!err.is_skip());
    }
}
