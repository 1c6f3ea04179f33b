//! Category-label inference.
//!
//! Each heuristic is a `LabelStrategy`: a pure function from a
//! `LabelSource` to an optional label. A variant's chain is evaluated in
//! order and the first non-empty answer wins.

use std::cell::Cell;

use url::Url;

use super::dom::{ElementNode, CAPTION_TAGS};
use super::images::ExtractionVariant;
use super::structure::PatternSet;
use super::url::file_stem;

/// How many ancestor levels the context heuristics climb.
pub const ANCESTOR_LEVELS: usize = 3;

/// Tags whose text can name an image in rendered pages.
const RENDERED_TEXT_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "a", "p"];

/// Attributes on ancestors that often carry a caption.
const CONTEXT_ATTRIBUTES: &[&str] = &["title", "aria-label", "data-title"];

/// Everything a label heuristic may look at.
pub struct LabelSource<'s, N: ElementNode> {
    /// The element the image came from.
    pub anchor: &'s N,
    /// First element of the ancestor walk.
    pub ascent_from: Option<N>,
    pub url: &'s Url,
    pub patterns: &'s PatternSet,
}

impl<'s, N: ElementNode> LabelSource<'s, N> {
    /// Up to `ANCESTOR_LEVELS` elements, starting at `ascent_from`.
    pub fn ancestors(&self) -> Vec<N> {
        std::iter::successors(self.ascent_from.clone(), |el| el.parent())
            .take(ANCESTOR_LEVELS)
            .collect()
    }
}

/// One label heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStrategy {
    /// The anchor's own `alt`, then `title`.
    OwnAttributes,
    /// Text of the first descendant carrying a discovered title class,
    /// searched from each ancestor in turn.
    TitleClassAncestor,
    /// First heading, link or paragraph text longer than two characters,
    /// searched from each ancestor in turn.
    CaptionTextAncestor,
    /// The URL's file name without extension.
    FilenameStem,
}

const STATIC_CHAIN: &[LabelStrategy] = &[
    LabelStrategy::OwnAttributes,
    LabelStrategy::TitleClassAncestor,
    LabelStrategy::FilenameStem,
];

const RENDERED_CHAIN: &[LabelStrategy] = &[
    LabelStrategy::OwnAttributes,
    LabelStrategy::CaptionTextAncestor,
];

impl LabelStrategy {
    /// Strategy chain for a fetch variant.
    pub fn chain(variant: ExtractionVariant) -> &'static [LabelStrategy] {
        match variant {
            ExtractionVariant::Static => STATIC_CHAIN,
            ExtractionVariant::Rendered => RENDERED_CHAIN,
        }
    }

    pub fn apply<N: ElementNode>(&self, source: &LabelSource<'_, N>) -> Option<String> {
        let label = match self {
            LabelStrategy::OwnAttributes => source
                .anchor
                .non_empty_attribute("alt")
                .or_else(|| source.anchor.non_empty_attribute("title")),
            LabelStrategy::TitleClassAncestor => {
                let titles = &source.patterns.title_classes;
                if titles.is_empty() {
                    return None;
                }
                source.ancestors().iter().find_map(|ancestor| {
                    ancestor
                        .find_first(&|el| {
                            el.classes().iter().any(|c| titles.contains(*c))
                                && !el.text().is_empty()
                        })
                        .map(|el| el.text())
                })
            }
            LabelStrategy::CaptionTextAncestor => source.ancestors().iter().find_map(|ancestor| {
                ancestor
                    .find_first(&|el| {
                        RENDERED_TEXT_TAGS.iter().any(|t| el.is_tag(t))
                            && el.text().chars().count() > 2
                    })
                    .map(|el| el.text())
            }),
            LabelStrategy::FilenameStem => file_stem(source.url).map(str::to_string),
        };
        label.filter(|l| !l.trim().is_empty())
    }
}

/// Run the variant's chain and return the first label found.
pub fn infer_label<N: ElementNode>(
    source: &LabelSource<'_, N>,
    variant: ExtractionVariant,
) -> Option<String> {
    LabelStrategy::chain(variant)
        .iter()
        .find_map(|strategy| strategy.apply(source))
}

/// Whether `element` holds more than one image, counting `<img>` tags and
/// inline background images. Stops at the second one.
fn holds_several_images<N: ElementNode>(element: &N) -> bool {
    let count = Cell::new(usize::from(is_image_bearing(element)));
    count.get() > 1
        || element
            .find_first(&|el| {
                if is_image_bearing(el) {
                    count.set(count.get() + 1);
                }
                count.get() > 1
            })
            .is_some()
}

fn is_image_bearing<N: ElementNode>(element: &N) -> bool {
    element.is_tag("img")
        || element
            .attribute("style")
            .is_some_and(|s| s.contains("background-image"))
}

/// Auxiliary context strings around the image, each recorded once.
///
/// Text and captions come only from ancestors that belong to this image
/// alone; a container shared with other images (a grid or list) contributes
/// its caption attributes but not its text.
pub fn context_labels<N: ElementNode>(source: &LabelSource<'_, N>) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    let mut push = |text: String| {
        let text = text.trim().to_string();
        if !text.is_empty() && !labels.contains(&text) {
            labels.push(text);
        }
    };

    let mut shared = false;
    for ancestor in source.ancestors() {
        shared = shared || holds_several_images(&ancestor);
        if !shared {
            push(ancestor.text());
        }

        for attr in CONTEXT_ATTRIBUTES {
            if let Some(value) = ancestor.attribute(attr) {
                push(value.to_string());
            }
        }

        if !shared {
            for caption in
                ancestor.find_descendants(&|el| CAPTION_TAGS.iter().any(|t| el.is_tag(t)))
            {
                push(caption.text());
            }
        }
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::dom::parse;
    use crate::extraction::structure::analyze;

    const CARD: &str = r#"<html><body>
        <section aria-label="Gallery">
          <div class="card" data-title="Card One">
            <div class="media"><img id="plain" src="/photos/sunset_beach.jpg"></div>
            <span class="card-title">Golden Hour</span>
            <a href="/p/1">Details</a>
          </div>
        </section>
    </body></html>"#;

    fn url() -> Url {
        Url::parse("https://site.example/photos/sunset_beach.jpg").unwrap()
    }

    #[test]
    fn test_own_attributes_win() {
        let doc = parse(r#"<div><img src="/x.jpg" alt="  " title="Night Sky"></div>"#);
        let root = doc.root_element();
        let img = root.find_first(&|e| e.is_tag("img")).unwrap();
        let patterns = PatternSet::default();
        let url = url();
        let source = LabelSource {
            anchor: &img,
            ascent_from: img.parent(),
            url: &url,
            patterns: &patterns,
        };
        assert_eq!(
            infer_label(&source, ExtractionVariant::Static).as_deref(),
            Some("Night Sky")
        );
    }

    #[test]
    fn test_static_uses_title_classes() {
        let doc = parse(CARD);
        let root = doc.root_element();
        let patterns = analyze(&root);
        let img = root.find_first(&|e| e.is_tag("img")).unwrap();
        let url = url();
        let source = LabelSource {
            anchor: &img,
            ascent_from: img.parent(),
            url: &url,
            patterns: &patterns,
        };
        assert_eq!(
            infer_label(&source, ExtractionVariant::Static).as_deref(),
            Some("Golden Hour")
        );
    }

    #[test]
    fn test_rendered_uses_caption_text() {
        let doc = parse(CARD);
        let root = doc.root_element();
        let patterns = analyze(&root);
        let img = root.find_first(&|e| e.is_tag("img")).unwrap();
        let url = url();
        let source = LabelSource {
            anchor: &img,
            ascent_from: img.parent(),
            url: &url,
            patterns: &patterns,
        };
        assert_eq!(
            infer_label(&source, ExtractionVariant::Rendered).as_deref(),
            Some("Details")
        );
    }

    #[test]
    fn test_filename_fallback_is_static_only() {
        let doc = parse(r#"<html><body><div><img src="/photos/sunset_beach.jpg"></div></body></html>"#);
        let root = doc.root_element();
        let patterns = PatternSet::default();
        let img = root.find_first(&|e| e.is_tag("img")).unwrap();
        let url = url();
        let source = LabelSource {
            anchor: &img,
            ascent_from: img.parent(),
            url: &url,
            patterns: &patterns,
        };
        assert_eq!(
            infer_label(&source, ExtractionVariant::Static).as_deref(),
            Some("sunset_beach")
        );
        assert_eq!(infer_label(&source, ExtractionVariant::Rendered), None);
    }

    #[test]
    fn test_short_caption_text_is_ignored() {
        let doc = parse(
            r#"<html><body><div><p>#1</p><div><img src="/a.jpg"></div><h4>Real Name</h4></div></body></html>"#,
        );
        let root = doc.root_element();
        let patterns = PatternSet::default();
        let img = root.find_first(&|e| e.is_tag("img")).unwrap();
        let url = url();
        let source = LabelSource {
            anchor: &img,
            ascent_from: img.parent(),
            url: &url,
            patterns: &patterns,
        };
        assert_eq!(
            LabelStrategy::CaptionTextAncestor.apply(&source).as_deref(),
            Some("Real Name")
        );
    }

    #[test]
    fn test_context_labels_are_unique() {
        let doc = parse(CARD);
        let root = doc.root_element();
        let patterns = analyze(&root);
        let img = root.find_first(&|e| e.is_tag("img")).unwrap();
        let url = url();
        let source = LabelSource {
            anchor: &img,
            ascent_from: img.parent(),
            url: &url,
            patterns: &patterns,
        };
        let labels = context_labels(&source);
        assert_eq!(
            labels,
            vec![
                "Golden HourDetails".to_string(),
                "Card One".to_string(),
                "Details".to_string(),
                "Gallery".to_string(),
            ]
        );
    }

    #[test]
    fn test_context_labels_stop_at_shared_container() {
        let cards: String = (0..50)
            .map(|i| {
                format!(
                    r#"<div class="card"><img src="/p/{i}.jpg"><h3>Card {i}</h3></div>"#
                )
            })
            .collect();
        let doc = parse(&format!(
            r#"<html><body><main title="Everything"><div class="grid">{cards}</div></main></body></html>"#
        ));
        let root = doc.root_element();
        let patterns = PatternSet::default();
        let img = root.find_first(&|e| e.is_tag("img")).unwrap();
        let url = url();
        let source = LabelSource {
            anchor: &img,
            ascent_from: img.parent(),
            url: &url,
            patterns: &patterns,
        };
        assert_eq!(
            context_labels(&source),
            vec!["Card 0".to_string(), "Everything".to_string()]
        );
    }

    #[test]
    fn test_holds_several_images() {
        let doc = parse(
            r#"<html><body>
                 <div id="one"><img src="/a.jpg"></div>
                 <div id="two"><img src="/a.jpg"><span style="background-image: url(/b.jpg)"></span></div>
               </body></html>"#,
        );
        let root = doc.root_element();
        let one = root.find_first(&|e| e.attribute("id") == Some("one")).unwrap();
        let two = root.find_first(&|e| e.attribute("id") == Some("two")).unwrap();
        assert!(!holds_several_images(&one));
        assert!(holds_several_images(&two));
    }
}
