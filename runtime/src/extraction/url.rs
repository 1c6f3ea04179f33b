//! Image URL normalization and asset filtering.

use url::Url;

use crate::error::ExtractionError;

/// Lowercase URL fragments that mark non-content assets.
pub const NON_CONTENT_MARKERS: &[&str] = &["icon", "logo", "banner", ".svg", ".ico"];

/// Resolve a raw `src`-like value to an absolute URL.
///
/// Protocol-relative values get `https:`, relative values are joined onto
/// `base`. Anything that still is not absolute is rejected.
pub fn normalize_url(raw: &str, base: &Url) -> Result<Url, ExtractionError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ExtractionError::MissingSource);
    }

    if raw.starts_with("//") {
        return Url::parse(&format!("https:{raw}"))
            .map_err(|_| ExtractionError::UnresolvableUrl(raw.to_string()));
    }

    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => base
            .join(raw)
            .map_err(|_| ExtractionError::UnresolvableUrl(raw.to_string())),
        Err(_) => Err(ExtractionError::UnresolvableUrl(raw.to_string())),
    }
}

/// True for URLs that look like icons, logos, banners or vector art.
pub fn is_non_content_asset(url: &str) -> bool {
    let lower = url.to_lowercase();
    NON_CONTENT_MARKERS.iter().any(|m| lower.contains(m))
}

/// Normalize `raw` and reject non-content assets.
pub fn resolve_image_url(raw: &str, base: &Url) -> Result<Url, ExtractionError> {
    let url = normalize_url(raw, base)?;
    if is_non_content_asset(url.as_str()) {
        return Err(ExtractionError::FilteredAsset(url.to_string()));
    }
    Ok(url)
}

/// Final path segment of `url`, without the query string.
pub fn file_name(url: &Url) -> Option<&str> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
}

/// File name without its extension.
pub fn file_stem(url: &Url) -> Option<&str> {
    let name = file_name(url)?;
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => Some(stem),
        _ => Some(name),
    }
}
