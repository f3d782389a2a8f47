use std::sync::LazyLock;

use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};

use super::text;

/// Content-root candidates, most specific first. The last entry is the bare body.
const ROOT_CANDIDATES: &[&str] = &[
    "div#document",
    "div.formContent",
    "div#main-content",
    "main",
    "article",
    "div#content",
    "body",
];

static ROOT_SELECTORS: LazyLock<Vec<(&'static str, Selector)>> = LazyLock::new(|| {
    ROOT_CANDIDATES
        .iter()
        .map(|css| (*css, Selector::parse(css).unwrap()))
        .collect()
});

const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "head", "nav", "header", "footer", "aside",
    "ix:header", "ix:hidden",
];
const SKIP_IDS: &[&str] = &["header", "footer", "toc"];
const SKIP_CLASSES: &[&str] = &["banner", "nav-bar", "formGrouping", "toc", "page-number"];
const SKIP_CLASS_FRAGMENTS: &[&str] = &["header", "footer", "navbar", "table-of-contents", "pagenum"];

/// The accepted content root.
pub struct Root<'a> {
    pub element: ElementRef<'a>,
    pub selector: &'static str,
}

/// Evaluate candidates in order; accept the first whose visible text reaches
/// `min_chars`. On failure returns the longest visible length seen.
pub fn find_root(doc: &Html, min_chars: usize) -> Result<Root<'_>, usize> {
    let mut best = 0;
    for (css, selector) in ROOT_SELECTORS.iter() {
        let Some(element) = doc.select(selector).next() else {
            continue;
        };
        let len = text::char_len(&text::clean(&visible_text(element)));
        if len >= min_chars {
            return Ok(Root {
                element,
                selector: *css,
            });
        }
        best = best.max(len);
    }
    Err(best)
}

/// Layout chrome, navigation, hidden inline-XBRL data and non-text elements.
pub fn is_boilerplate(el: &Element) -> bool {
    let name = el.name();
    if SKIP_TAGS.contains(&name) {
        return true;
    }
    if el.id().is_some_and(|id| SKIP_IDS.contains(&id)) {
        return true;
    }
    el.classes().any(|class| {
        SKIP_CLASSES.contains(&class) || {
            let lower = class.to_ascii_lowercase();
            SKIP_CLASS_FRAGMENTS.iter().any(|frag| lower.contains(frag))
        }
    })
}

/// Text of `el` and its descendants, skipping boilerplate subtrees.
pub fn visible_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_visible(el, &mut out);
    out
}

fn push_visible(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => {
                if is_boilerplate(e) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    // Keep words in adjacent cells/paragraphs apart.
                    out.push(' ');
                    push_visible(child_el, out);
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler(n: usize) -> String {
        "x".repeat(n)
    }

    #[test]
    fn prefers_specific_wrapper_over_short_generic_containers() {
        let html = format!(
            "<html><body><main>{}</main><div id=\"document\"><p>{}</p></div></body></html>",
            filler(50),
            filler(300)
        );
        let doc = Html::parse_document(&html);
        let root = find_root(&doc, 200).unwrap();
        assert_eq!(root.selector, "div#document");
    }

    #[test]
    fn skips_thin_candidate_and_falls_through() {
        let html = format!(
            "<html><body><div id=\"document\">{}</div><article>{}</article></body></html>",
            filler(50),
            filler(250)
        );
        let doc = Html::parse_document(&html);
        let root = find_root(&doc, 200).unwrap();
        assert_eq!(root.selector, "article");
    }

    #[test]
    fn bare_body_is_last_resort() {
        let html = format!("<html><body><p>{}</p><p>{}</p></body></html>", filler(120), filler(120));
        let doc = Html::parse_document(&html);
        let root = find_root(&doc, 200).unwrap();
        assert_eq!(root.selector, "body");
    }

    #[test]
    fn reports_best_length_when_nothing_qualifies() {
        let html = format!("<html><body><main>{}</main></body></html>", filler(80));
        let doc = Html::parse_document(&html);
        assert_eq!(find_root(&doc, 200).err(), Some(80));
    }

    #[test]
    fn navigation_chrome_does_not_count() {
        let html = format!(
            "<html><body><nav>{}</nav><div class=\"site-header\">{}</div><p>short</p></body></html>",
            filler(300),
            filler(300)
        );
        let doc = Html::parse_document(&html);
        assert!(find_root(&doc, 200).is_err());
    }
}
