//! Extraction: from a raw HTML document to categorized image candidates.
//!
//! Everything here is synchronous. `scraper` documents are `!Send`, so the
//! parsed tree never outlives `extract_document`; callers receive owned
//! candidates only.

pub mod category;
pub mod dom;
pub mod images;
pub mod labels;
pub mod structure;
pub mod url;

use crate::acquisition::page_fetcher::RawDocument;

pub use category::{categorize, classify, CategorizedCandidates, Category};
pub use images::{ExtractionVariant, ImageCandidate};
pub use structure::PatternSet;

/// What one document yielded.
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub patterns: PatternSet,
    pub candidates: Vec<ImageCandidate>,
}

/// Parse `document`, learn its class vocabulary and extract candidates.
pub fn extract_document(document: &RawDocument, variant: ExtractionVariant) -> ExtractionReport {
    let html = dom::parse(&document.html);
    let root = html.root_element();

    let patterns = structure::analyze(&root);
    let candidates = images::extract(&root, &document.url, &patterns, variant);

    tracing::info!(
        "extracted {} image candidates from {} ({variant:?})",
        candidates.len(),
        document.url
    );

    ExtractionReport {
        patterns,
        candidates,
    }
}
