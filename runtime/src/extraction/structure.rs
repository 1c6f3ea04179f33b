//! Page-structure analysis: learn which class names mark images, image
//! containers and titles on this particular page.

use std::collections::BTreeSet;

use super::dom::ElementNode;

/// Substrings that mark a class list as image-related.
pub const IMAGE_KEYWORDS: &[&str] = &["img", "image", "photo", "thumb", "avatar"];

/// Substrings that mark a class list as title-related.
pub const TITLE_KEYWORDS: &[&str] = &["title", "name", "heading", "caption"];

/// Class-name vocabulary discovered on one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    /// Classes of elements that contain at least one `<img>`.
    pub image_container_classes: BTreeSet<String>,
    /// Classes of elements whose class list mentions an image keyword.
    pub image_classes: BTreeSet<String>,
    /// Classes of elements whose class list mentions a title keyword.
    pub title_classes: BTreeSet<String>,
}

impl PatternSet {
    /// True when nothing was discovered; extraction then relies on direct
    /// `<img>` and inline-style scanning only.
    pub fn is_empty(&self) -> bool {
        self.image_container_classes.is_empty()
            && self.image_classes.is_empty()
            && self.title_classes.is_empty()
    }
}

/// Scan every classed element under (and including) `root`.
pub fn analyze<N: ElementNode>(root: &N) -> PatternSet {
    let mut patterns = PatternSet::default();

    let classed = std::iter::once(root.clone())
        .filter(|el| !el.classes().is_empty())
        .chain(root.find_descendants(&|el| !el.classes().is_empty()));

    let mut seen = 0usize;
    for element in classed {
        seen += 1;
        let classes = element.classes();
        let joined = classes.join(" ").to_lowercase();

        if IMAGE_KEYWORDS.iter().any(|k| joined.contains(k)) {
            patterns
                .image_classes
                .extend(classes.iter().map(|c| c.to_string()));
        }

        if TITLE_KEYWORDS.iter().any(|k| joined.contains(k)) {
            patterns
                .title_classes
                .extend(classes.iter().map(|c| c.to_string()));
        }

        if element.find_first(&|d| d.is_tag("img")).is_some() {
            patterns
                .image_container_classes
                .extend(classes.iter().map(|c| c.to_string()));
        }
    }

    tracing::debug!(
        "analyzed {seen} classed elements: {} container, {} image, {} title classes",
        patterns.image_container_classes.len(),
        patterns.image_classes.len(),
        patterns.title_classes.len()
    );

    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::dom::parse;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_discovers_all_three_vocabularies() {
        let doc = parse(
            r#"<html><body>
              <ul class="grid">
                <li class="card">
                  <a class="Thumb-Link"><img class="lazy" data-src="/a.jpg"></a>
                  <span class="star-Name">Ann</span>
                </li>
              </ul>
              <p class="ImageCaption">caption</p>
            </body></html>"#,
        );
        let patterns = analyze(&doc.root_element());

        assert_eq!(
            patterns.image_container_classes,
            set(&["Thumb-Link", "card", "grid"])
        );
        assert_eq!(patterns.image_classes, set(&["ImageCaption", "Thumb-Link"]));
        assert_eq!(patterns.title_classes, set(&["ImageCaption", "star-Name"]));
    }

    #[test]
    fn test_one_matching_class_records_the_whole_list() {
        // One matching class is enough to record every class of the element.
        let doc = parse(r#"<div class="user avatar-sm rounded"></div>"#);
        let patterns = analyze(&doc.root_element());
        assert_eq!(patterns.image_classes, set(&["avatar-sm", "rounded", "user"]));
        assert!(patterns.image_container_classes.is_empty());
    }

    #[test]
    fn test_empty_document_yields_empty_patterns() {
        let doc = parse("<html><body><p>No classes here</p><img src='x.jpg'></body></html>");
        let patterns = analyze(&doc.root_element());
        assert!(patterns.is_empty());
    }
}
