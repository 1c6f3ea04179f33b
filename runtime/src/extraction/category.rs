//! Category keys: canonical, filesystem-safe names derived from noisy labels.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::images::ImageCandidate;

/// Sentinel category for labels that normalize to nothing useful.
pub const UNCATEGORIZED: &str = "uncategorized";

const MAX_WORDS: usize = 3;
const MIN_LEN: usize = 3;

/// Canonical category key, e.g. `beautiful_sunset_photo`.
///
/// Only lowercase ASCII alphanumerics and underscores, so it is always a
/// valid directory name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn uncategorized() -> Self {
        Category(UNCATEGORIZED.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_uncategorized(&self) -> bool {
        self.0 == UNCATEGORIZED
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Category {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a raw label into a category key.
///
/// Lowercases, treats every non-ASCII-alphanumeric character as a word
/// break, keeps the first three words and joins them with `_`. Keys shorter
/// than three characters collapse to `uncategorized`. Never fails.
pub fn classify(raw_label: &str) -> Category {
    let lower = raw_label.to_lowercase();
    let key = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .take(MAX_WORDS)
        .collect::<Vec<_>>()
        .join("_");

    if key.len() < MIN_LEN {
        Category::uncategorized()
    } else {
        Category(key)
    }
}

/// Candidates grouped by category. Category order is alphabetical; within a
/// category, extraction order is kept.
pub type CategorizedCandidates = BTreeMap<Category, Vec<ImageCandidate>>;

/// Classify every candidate's label and group them.
pub fn categorize(candidates: Vec<ImageCandidate>) -> CategorizedCandidates {
    let mut grouped = CategorizedCandidates::new();
    for candidate in candidates {
        let category = classify(candidate.label.as_deref().unwrap_or_default());
        tracing::debug!("found image: {} -> {category}", candidate.normalized_url);
        grouped.entry(category).or_default().push(candidate);
    }
    grouped
}

/// Total number of candidates across all categories.
pub fn candidate_count(grouped: &CategorizedCandidates) -> usize {
    grouped.values().map(Vec::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn candidate(url: &str, label: Option<&str>) -> ImageCandidate {
        ImageCandidate {
            raw_url: url.to_string(),
            normalized_url: Url::parse(url).unwrap(),
            alt_text: String::new(),
            title_text: String::new(),
            context_labels: Vec::new(),
            label: label.map(str::to_string),
        }
    }

    #[test]
    fn test_noisy_label() {
        assert_eq!(
            classify("Beautiful-Sunset!! Photo #1").as_str(),
            "beautiful_sunset_photo"
        );
    }

    #[test]
    fn test_short_labels_fall_back() {
        assert!(classify("").is_uncategorized());
        assert!(classify("a").is_uncategorized());
        assert!(classify("ab").is_uncategorized());
        assert!(classify("!!! ??").is_uncategorized());
        assert_eq!(classify("a b").as_str(), "a_b");
    }

    #[test]
    fn test_canonical_keys_are_fixed_points() {
        for label in [
            "Beautiful-Sunset!! Photo #1",
            "Jane Doe",
            "  MIXED case   words and more ",
            "x",
            "uncategorized",
            "日本語 title 2024",
        ] {
            let once = classify(label);
            let twice = classify(once.as_str());
            assert_eq!(once, twice, "classify not idempotent for {label:?}");
        }
    }

    #[test]
    fn test_non_ascii_is_a_separator() {
        assert_eq!(classify("Café Olé").as_str(), "caf_ol");
        assert_eq!(classify("日本語 title 2024").as_str(), "title_2024");
    }

    #[test]
    fn test_categorize_groups_in_order() {
        let grouped = categorize(vec![
            candidate("https://x.example/1.jpg", Some("Jane Doe")),
            candidate("https://x.example/2.jpg", None),
            candidate("https://x.example/3.jpg", Some("jane-doe")),
        ]);

        assert_eq!(grouped.len(), 2);
        let jane = &grouped[&classify("Jane Doe")];
        assert_eq!(jane.len(), 2);
        assert_eq!(jane[0].raw_url, "https://x.example/1.jpg");
        assert_eq!(jane[1].raw_url, "https://x.example/3.jpg");
        assert_eq!(grouped[&Category::uncategorized()].len(), 1);
        assert_eq!(candidate_count(&grouped), 3);
    }
}
