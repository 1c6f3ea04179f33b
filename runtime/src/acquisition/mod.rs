//! Network side of the pipeline: page retrieval and image downloads.
//!
//! Both share one pooled `HttpClient` with browser-like headers and the
//! same retry policy.

pub mod engine;
pub mod http_client;
pub mod page_fetcher;

pub use engine::{AcquisitionEngine, AcquisitionOutcome, OutcomeCounts, OutcomeKind};
pub use http_client::HttpClient;
pub use page_fetcher::{fetch_rendered, PageFetcher, RawDocument};
