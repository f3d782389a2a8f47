use crate::error::FilingError;
use crate::model::{PageHeading, Section};

use super::items::ItemTag;

/// Untagged sections shorter than this fold into the previous one.
const MIN_SECTION_CHARS: usize = 50;
const FULL_DOCUMENT: &str = "Full Document";

/// Split the body at heading offsets. Text before the first heading belongs
/// to no section; a page without headings becomes one level-1 section.
pub fn segment(body: &str, headings: &[PageHeading]) -> Result<Vec<Section>, FilingError> {
    validate_offsets(body, headings)?;

    if headings.is_empty() {
        return Ok(vec![build(0, 1, FULL_DOCUMENT.to_string(), body.trim().to_string(), None)]);
    }

    let mut sections: Vec<Section> = Vec::with_capacity(headings.len());
    for (i, heading) in headings.iter().enumerate() {
        let start = heading.offset + heading.text.len();
        let end = headings.get(i + 1).map_or(body.len(), |next| next.offset);
        let text = body[start..end].trim();
        let item = ItemTag::detect(&heading.text);

        if item.is_none() && text.chars().count() < MIN_SECTION_CHARS {
            if let Some(prev) = sections.last_mut() {
                prev.body_text.push('\n');
                prev.body_text.push_str(&heading.text);
                if !text.is_empty() {
                    prev.body_text.push('\n');
                    prev.body_text.push_str(text);
                }
                prev.word_count = word_count(&prev.body_text);
                prev.char_count = prev.body_text.chars().count();
                continue;
            }
        }

        let position = sections.len() as u32;
        sections.push(build(position, heading.level, heading.text.clone(), text.to_string(), item));
    }
    Ok(sections)
}

fn build(position: u32, level: u8, heading: String, body_text: String, item: Option<ItemTag>) -> Section {
    Section {
        position,
        level,
        word_count: word_count(&body_text),
        char_count: body_text.chars().count(),
        heading,
        body_text,
        item,
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn validate_offsets(body: &str, headings: &[PageHeading]) -> Result<(), FilingError> {
    let mut floor = 0;
    for h in headings {
        let end = h.offset + h.text.len();
        if h.offset < floor || body.get(h.offset..end) != Some(h.text.as_str()) {
            return Err(FilingError::Enrichment(format!(
                "heading {:?} does not match body at byte offset {}",
                h.text, h.offset
            )));
        }
        floor = end;
    }
    Ok(())
}
