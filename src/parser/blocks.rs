use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Node, Selector};

use super::root::{is_boilerplate, visible_text};
use super::text;

static BOLD_STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)font-weight\s*:\s*(bold|[6-9]\d\d)").unwrap());
static BOLD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("b, strong").unwrap());
static STYLED_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[style]").unwrap());

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "body", "caption", "center", "dd", "div", "dl", "dt",
    "figcaption", "figure", "form", "hr", "li", "main", "ol", "p", "pre", "section", "table",
    "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];
const PSEUDO_HEADING_TAGS: &[&str] = &["p", "div", "span", "font"];
const HEADING_CLASSES: &[&str] = &[
    "sectionHeading", "itemHeading", "item-heading", "heading", "sHeading", "hd",
];
const MAX_PSEUDO_HEADING_CHARS: usize = 160;

/// Predicate deciding whether bold, short text is a heading in disguise.
pub type HeadingHint = fn(&str) -> bool;

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, text: String },
    Text(String),
}

/// Flatten the content root into headings and text blocks in document order.
pub fn collect_blocks(root: ElementRef<'_>, hint: Option<HeadingHint>) -> Vec<Block> {
    let mut walker = Walker {
        blocks: Vec::new(),
        inline: String::new(),
        hint,
    };
    walker.walk(root);
    walker.flush();
    walker.blocks
}

struct Walker {
    blocks: Vec<Block>,
    inline: String,
    hint: Option<HeadingHint>,
}

impl Walker {
    fn walk(&mut self, el: ElementRef<'_>) {
        for child in el.children() {
            match child.value() {
                Node::Text(t) => self.inline.push_str(t),
                Node::Element(e) => {
                    if is_boilerplate(e) {
                        continue;
                    }
                    let Some(child_el) = ElementRef::wrap(child) else {
                        continue;
                    };
                    let name = e.name();

                    if let Some(level) = heading_level(name) {
                        self.flush();
                        let heading = text::clean(&visible_text(child_el));
                        if !heading.is_empty() {
                            self.blocks.push(Block::Heading { level, text: heading });
                        }
                        continue;
                    }

                    if let Some(heading) = self.styled_heading(child_el) {
                        self.flush();
                        self.blocks.push(Block::Heading { level: 2, text: heading });
                        continue;
                    }

                    if name == "br" {
                        self.inline.push(' ');
                    } else if BLOCK_TAGS.contains(&name) {
                        self.flush();
                        self.walk(child_el);
                        self.flush();
                    } else {
                        self.inline.push(' ');
                        self.walk(child_el);
                        self.inline.push(' ');
                    }
                }
                _ => {}
            }
        }
    }

    fn flush(&mut self) {
        let cleaned = text::clean(&self.inline);
        self.inline.clear();
        if cleaned.is_empty() || text::is_page_number(&cleaned) {
            return;
        }
        self.blocks.push(Block::Text(cleaned));
    }

    /// Bold paragraph-like element whose text satisfies the heading hint.
    fn styled_heading(&self, el: ElementRef<'_>) -> Option<String> {
        let hint = self.hint?;
        if !PSEUDO_HEADING_TAGS.contains(&el.value().name()) {
            return None;
        }
        let heading = text::clean(&visible_text(el));
        let len = text::char_len(&heading);
        if len == 0 || len > MAX_PSEUDO_HEADING_CHARS || !hint(&heading) {
            return None;
        }
        if is_bold(el, len) {
            Some(heading)
        } else {
            None
        }
    }
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn is_bold(el: ElementRef<'_>, text_len: usize) -> bool {
    let bold_len: usize = el
        .select(&BOLD_SEL)
        .map(|b| text::char_len(&text::clean(&visible_text(b))))
        .sum();
    if bold_len * 10 >= text_len * 7 {
        return true;
    }

    let own_style = el.value().attr("style").unwrap_or_default();
    if BOLD_STYLE_RE.is_match(own_style) {
        return true;
    }
    let styled_descendant = el
        .select(&STYLED_SEL)
        .filter_map(|d| d.value().attr("style"))
        .any(|style| BOLD_STYLE_RE.is_match(style));
    if styled_descendant {
        return true;
    }

    el.value().classes().any(|c| HEADING_CLASSES.contains(&c))
}
