//! Image candidate extraction.
//!
//! Enumerates image-bearing elements (direct tags, discovered classes and
//! inline background styles), resolves their URLs and attaches a raw
//! category label plus context strings.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use super::dom::ElementNode;
use super::labels::{context_labels, infer_label, LabelSource};
use super::structure::PatternSet;
use super::url::resolve_image_url;
use crate::error::ExtractionError;

/// `<img>` attributes that may carry the image URL, in priority order.
pub const SOURCE_ATTRIBUTES: &[&str] = &["data-src", "data-lazy-src", "src"];

/// Which fetch produced the document. Selects the label strategy chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionVariant {
    Static,
    Rendered,
}

/// One discovered image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCandidate {
    /// URL exactly as found in the markup.
    pub raw_url: String,
    /// Absolute URL.
    pub normalized_url: Url,
    pub alt_text: String,
    pub title_text: String,
    pub context_labels: Vec<String>,
    /// Raw category label, if any strategy produced one.
    pub label: Option<String>,
}

/// An element that yields an image URL, before resolution.
struct Source<N> {
    anchor: N,
    ascent_from: Option<N>,
    raw_url: Option<String>,
}

fn background_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"url\(["']?([^"')]+)["']?\)"#).expect("background url regex is valid")
    })
}

/// The URL of an `<img>`, read from the first non-empty source attribute.
pub fn img_source<N: ElementNode>(img: &N) -> Option<String> {
    SOURCE_ATTRIBUTES
        .iter()
        .find_map(|attr| img.non_empty_attribute(attr))
}

fn img_entry<N: ElementNode>(img: N) -> Source<N> {
    Source {
        raw_url: img_source(&img),
        ascent_from: img.parent(),
        anchor: img,
    }
}

/// Gather raw sources in extraction order.
fn collect_sources<N: ElementNode>(root: &N, patterns: &PatternSet) -> Vec<Source<N>> {
    let mut sources = Vec::new();

    // Direct tags.
    sources.extend(
        root.find_descendants(&|el| el.is_tag("img") && img_source(el).is_some())
            .into_iter()
            .map(img_entry),
    );

    for class in &patterns.image_container_classes {
        for container in root.find_descendants(&|el| el.has_class(class)) {
            if let Some(img) = container.find_first(&|el| el.is_tag("img")) {
                sources.push(img_entry(img));
            }
        }
    }

    for class in &patterns.image_classes {
        sources.extend(
            root.find_descendants(&|el| el.is_tag("img") && el.has_class(class))
                .into_iter()
                .map(img_entry),
        );
    }

    let styled = root.find_descendants(&|el| {
        el.attribute("style")
            .is_some_and(|s| s.contains("background-image"))
    });
    for element in styled {
        let raw_url = element
            .attribute("style")
            .and_then(|style| background_url_re().captures(style))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
        sources.push(Source {
            raw_url,
            ascent_from: Some(element.clone()),
            anchor: element,
        });
    }

    sources
}

fn resolve_source<N: ElementNode>(
    source: &Source<N>,
    base: &Url,
) -> Result<(String, Url), ExtractionError> {
    let raw_url = source.raw_url.clone().ok_or(ExtractionError::MissingSource)?;
    let normalized_url = resolve_image_url(&raw_url, base)?;
    Ok((raw_url, normalized_url))
}

fn build_candidate<N: ElementNode>(
    source: Source<N>,
    raw_url: String,
    normalized_url: Url,
    patterns: &PatternSet,
    variant: ExtractionVariant,
) -> ImageCandidate {
    let label_source = LabelSource {
        anchor: &source.anchor,
        ascent_from: source.ascent_from.clone(),
        url: &normalized_url,
        patterns,
    };
    let label = infer_label(&label_source, variant);
    let context_labels = context_labels(&label_source);

    ImageCandidate {
        alt_text: source.anchor.non_empty_attribute("alt").unwrap_or_default(),
        title_text: source.anchor.non_empty_attribute("title").unwrap_or_default(),
        raw_url,
        normalized_url,
        context_labels,
        label,
    }
}

/// Enumerate image candidates under `root`.
///
/// Candidates are unique by normalized URL; the first occurrence wins and
/// later duplicates are dropped before any label work.
pub fn extract<N: ElementNode>(
    root: &N,
    base: &Url,
    patterns: &PatternSet,
    variant: ExtractionVariant,
) -> Vec<ImageCandidate> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for source in collect_sources(root, patterns) {
        let (raw_url, normalized_url) = match resolve_source(&source, base) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::debug!("skipping <{}>: {e}", source.anchor.tag_name());
                continue;
            }
        };
        if !seen.insert(normalized_url.to_string()) {
            continue;
        }
        candidates.push(build_candidate(
            source,
            raw_url,
            normalized_url,
            patterns,
            variant,
        ));
    }

    candidates
}
