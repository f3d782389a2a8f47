use std::sync::LazyLock;

use regex::Regex;

static PAGE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:page\s+)?[-–—]?\s*\d{1,3}\s*[-–—]?$").unwrap());

/// Strip control and zero-width characters and collapse whitespace runs.
pub fn clean(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| !matches!(c, '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{feff}'))
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Bare page-number artifacts ("47", "- 47 -", "Page 3").
pub fn is_page_number(text: &str) -> bool {
    PAGE_NUMBER_RE.is_match(&text.to_lowercase())
}

/// Visible character count of already-cleaned text.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
