pub mod blocks;
pub mod root;
pub mod text;

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::error::FilingError;
use crate::model::{ExtractedPage, PageHeading};
use blocks::{Block, HeadingHint};

pub const MIN_BODY_CHARS: usize = 200;

static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static H1_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static TABLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static CODE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("pre, code").unwrap());
static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static BREADCRUMB_SELS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [".breadcrumb", ".breadcrumbs", "#breadcrumb", "[aria-label='breadcrumb']", ".crumbs"]
        .iter()
        .map(|css| Selector::parse(css).unwrap())
        .collect()
});

/// No content candidate reached the length floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotExtractable {
    pub best_chars: usize,
    pub min_chars: usize,
}

impl From<NotExtractable> for FilingError {
    fn from(e: NotExtractable) -> Self {
        FilingError::NotExtractable {
            best_chars: e.best_chars,
            min_chars: e.min_chars,
        }
    }
}

/// Markup → normalized page. Knows nothing about filings; callers may pass a
/// predicate that recognizes bold paragraphs acting as headings.
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    min_chars: usize,
    heading_hint: Option<HeadingHint>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            min_chars: MIN_BODY_CHARS,
            heading_hint: None,
        }
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heading_hint(mut self, hint: HeadingHint) -> Self {
        self.heading_hint = Some(hint);
        self
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    pub fn extract(&self, raw: &str) -> Result<ExtractedPage, NotExtractable> {
        let doc = Html::parse_document(raw);
        let root = root::find_root(&doc, self.min_chars).map_err(|best| NotExtractable {
            best_chars: best,
            min_chars: self.min_chars,
        })?;

        let blocks = blocks::collect_blocks(root.element, self.heading_hint);
        let (body_text, headings) = assemble(blocks);

        // Page-number and heading cleanup can pull the body back under the floor.
        let body_chars = text::char_len(&body_text);
        if body_chars < self.min_chars {
            return Err(NotExtractable {
                best_chars: body_chars,
                min_chars: self.min_chars,
            });
        }

        tracing::debug!(
            selector = root.selector,
            chars = body_chars,
            headings = headings.len(),
            "content root accepted"
        );

        Ok(ExtractedPage {
            title: page_title(&doc),
            body_text,
            headings,
            raw_char_count: raw.chars().count(),
            code_char_count: code_chars(root.element),
            table_count: root.element.select(&TABLE_SEL).count(),
            link_count: root.element.select(&LINK_SEL).count(),
            breadcrumbs: breadcrumbs(&doc),
        })
    }
}

/// Join blocks into one body, recording the byte offset of every heading.
fn assemble(blocks: Vec<Block>) -> (String, Vec<PageHeading>) {
    let mut body = String::new();
    let mut headings = Vec::new();

    for block in blocks {
        match block {
            Block::Heading { level, text } => {
                if !body.is_empty() {
                    body.push_str("\n\n");
                }
                headings.push(PageHeading {
                    level,
                    offset: body.len(),
                    text: text.clone(),
                });
                body.push_str(&text);
            }
            Block::Text(text) => {
                if !body.is_empty() {
                    body.push('\n');
                }
                body.push_str(&text);
            }
        }
    }
    (body, headings)
}

/// `<title>` unless it is a generic archive label, then the first h1.
fn page_title(doc: &Html) -> Option<String> {
    let from_title = doc
        .select(&TITLE_SEL)
        .next()
        .map(|t| text::clean(&t.text().collect::<String>()))
        .filter(|t| text::char_len(t) > 5 && !t.to_uppercase().contains("EDGAR"));
    if from_title.is_some() {
        return from_title;
    }
    doc.select(&H1_SEL)
        .map(|h| text::clean(&h.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

/// Visible text inside `pre`/`code`, counting nested `code` once.
fn code_chars(root: ElementRef<'_>) -> usize {
    root.select(&CODE_SEL)
        .filter(|el| {
            !el.ancestors()
                .filter_map(|a| a.value().as_element())
                .any(|a| a.name() == "pre")
        })
        .map(|el| text::char_len(&text::clean(&root::visible_text(el))))
        .sum()
}

/// Link texts of the first breadcrumb trail that has any.
fn breadcrumbs(doc: &Html) -> Vec<String> {
    for selector in BREADCRUMB_SELS.iter() {
        let Some(trail) = doc.select(selector).next() else {
            continue;
        };
        let crumbs: Vec<String> = trail
            .select(&ANCHOR_SEL)
            .map(|a| text::clean(&a.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .collect();
        if !crumbs.is_empty() {
            return crumbs;
        }
    }
    Vec::new()
}

// ── Tests ──
