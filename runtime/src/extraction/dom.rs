//! Element capability interface over the parsed DOM.
//!
//! The structure analyzer and image extractor only ever see `ElementNode`,
//! so they work on any markup backend. The `scraper` implementation lives
//! here. `scraper` types are `!Send`: parse and walk synchronously, and
//! hand only owned results across await points.

use scraper::{ElementRef, Html};

/// Heading and link tags whose text is treated as a caption.
pub const CAPTION_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "a"];

/// Capabilities the extraction heuristics need from a DOM element.
pub trait ElementNode: Clone {
    /// Lowercase tag name.
    fn tag_name(&self) -> &str;
    /// Class names, in attribute order.
    fn classes(&self) -> Vec<&str>;
    /// Attribute value by name.
    fn attribute(&self, name: &str) -> Option<&str>;
    /// Text content: every text node trimmed, empty pieces dropped, the
    /// rest concatenated.
    fn text(&self) -> String;
    /// Child elements.
    fn children(&self) -> Vec<Self>;
    /// Parent element, if the parent is an element.
    fn parent(&self) -> Option<Self>;
    /// Descendant elements (excluding `self`) matching `predicate`, in
    /// document order.
    fn find_descendants(&self, predicate: &dyn Fn(&Self) -> bool) -> Vec<Self>;

    /// First descendant matching `predicate`.
    fn find_first(&self, predicate: &dyn Fn(&Self) -> bool) -> Option<Self> {
        self.find_descendants(predicate).into_iter().next()
    }

    fn is_tag(&self, name: &str) -> bool {
        self.tag_name().eq_ignore_ascii_case(name)
    }

    fn has_class(&self, class: &str) -> bool {
        self.classes().iter().any(|c| *c == class)
    }

    /// Attribute value, trimmed, if non-empty.
    fn non_empty_attribute(&self, name: &str) -> Option<String> {
        self.attribute(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}

impl<'a> ElementNode for ElementRef<'a> {
    fn tag_name(&self) -> &str {
        self.value().name()
    }

    fn classes(&self) -> Vec<&str> {
        self.value().classes().collect()
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.value().attr(name)
    }

    fn text(&self) -> String {
        (**self)
            .descendants()
            .filter_map(|node| {
                let text = node.value().as_text()?;
                let in_script = node
                    .parent()
                    .and_then(ElementRef::wrap)
                    .map(|p| matches!(p.value().name(), "script" | "style" | "noscript"))
                    .unwrap_or(false);
                if in_script {
                    None
                } else {
                    Some(text.trim())
                }
            })
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .concat()
    }

    fn children(&self) -> Vec<Self> {
        (**self).children().filter_map(ElementRef::wrap).collect()
    }

    fn parent(&self) -> Option<Self> {
        (**self).parent().and_then(ElementRef::wrap)
    }

    fn find_descendants(&self, predicate: &dyn Fn(&Self) -> bool) -> Vec<Self> {
        (**self)
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|el| predicate(el))
            .collect()
    }

    fn find_first(&self, predicate: &dyn Fn(&Self) -> bool) -> Option<Self> {
        (**self)
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .find(|el| predicate(el))
    }
}

/// Parse an HTML document. The root element is `document.root_element()`.
pub fn parse(html: &str) -> Html {
    Html::parse_document(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"
        <html><body>
          <div class="card featured" id="c1" title="Card">
            <h3> Jane   Doe </h3>
            <img src="/a.jpg" alt="A">
            <script>var x = 1;</script>
            <p><b>Bold</b> <i>text</i></p>
          </div>
        </body></html>"#;

    #[test]
    fn test_classes_and_attributes() {
        let doc = parse(HTML);
        let root = doc.root_element();
        let card = root.find_first(&|e| e.has_class("card")).unwrap();
        assert_eq!(card.tag_name(), "div");
        assert_eq!(card.classes(), vec!["card", "featured"]);
        assert_eq!(card.attribute("title"), Some("Card"));
        assert_eq!(card.attribute("missing"), None);
        assert_eq!(card.non_empty_attribute("id").as_deref(), Some("c1"));
    }

    #[test]
    fn test_text_strips_and_concatenates() {
        let doc = parse(HTML);
        let root = doc.root_element();
        let p = root.find_first(&|e| e.is_tag("p")).unwrap();
        assert_eq!(ElementNode::text(&p), "Boldtext");
        let h3 = root.find_first(&|e| e.is_tag("h3")).unwrap();
        assert_eq!(ElementNode::text(&h3), "Jane   Doe");
    }

    #[test]
    fn test_text_ignores_script_bodies() {
        let doc = parse(HTML);
        let card = doc.root_element().find_first(&|e| e.has_class("card")).unwrap();
        let text = ElementNode::text(&card);
        assert!(!text.contains("var x"));
        assert!(text.starts_with("Jane   Doe"));
    }

    #[test]
    fn test_navigation() {
        let doc = parse(HTML);
        let root = doc.root_element();
        let img = root.find_first(&|e| e.is_tag("img")).unwrap();
        let parent = img.parent().unwrap();
        assert!(parent.has_class("card"));
        let child_tags: Vec<_> = parent
            .children()
            .iter()
            .map(|c| c.tag_name().to_string())
            .collect();
        assert_eq!(child_tags, vec!["h3", "img", "script", "p"]);
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_find_descendants_excludes_self() {
        let doc = parse(HTML);
        let card = doc.root_element().find_first(&|e| e.has_class("card")).unwrap();
        assert!(card.find_descendants(&|e| e.has_class("card")).is_empty());
        assert_eq!(card.find_descendants(&|_| true).len(), 6);
    }
}
