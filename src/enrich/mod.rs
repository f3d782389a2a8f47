pub mod items;
pub mod language;
pub mod quality;
pub mod sections;
pub mod tags;

use chrono::Datelike;
use sha2::{Digest, Sha256};
use url::Url;
use uuid::Uuid;

use crate::config::EnrichConfig;
use crate::error::FilingError;
use crate::model::{normalize_accession, Document, ExtractedPage, FilingContext};
use items::ItemTag;
use quality::QualityInputs;

/// Finalize an extracted page into a document. No I/O and no clock: the same
/// page and context always produce the same document.
pub fn enrich(
    page: &ExtractedPage,
    ctx: &FilingContext,
    cfg: &EnrichConfig,
) -> Result<Document, FilingError> {
    let filing = &ctx.filing;
    if normalize_accession(&filing.accession_number).as_deref() != Some(filing.accession_number.as_str()) {
        return Err(FilingError::Enrichment(format!(
            "accession number {:?} is not canonical",
            filing.accession_number
        )));
    }
    if page.body_text.trim().is_empty() {
        return Err(FilingError::Enrichment("empty body text".to_string()));
    }
    if cfg.reading_wpm <= 0.0 {
        return Err(FilingError::Enrichment("reading rate must be positive".to_string()));
    }
    let depth_in_site = depth_in_site(&ctx.url)?;

    let sections = sections::segment(&page.body_text, &page.headings)?;
    let (language, lang_confidence) = language::detect(&page.body_text);

    let word_count = sections::word_count(&page.body_text);
    let char_count = page.body_text.chars().count();
    let quality = quality::score(
        &QualityInputs {
            word_count,
            lang_confidence,
            body_chars: char_count,
            raw_chars: page.raw_char_count,
            section_count: sections.len(),
        },
        cfg,
    );

    let mut items: Vec<ItemTag> = Vec::new();
    for item in sections.iter().filter_map(|s| s.item) {
        if !items.contains(&item) {
            items.push(item);
        }
    }
    let content_type = tags::content_type(&filing.form_type);
    let tags = tags::build(
        content_type,
        &filing.form_type,
        ctx.company.sic_code.as_deref(),
        &items,
    );

    let content_hash = content_hash(&page.body_text);
    let title = page
        .title
        .clone()
        .unwrap_or_else(|| format!("{} Form {}", ctx.company.name, filing.form_type));

    Ok(Document {
        id: Uuid::new_v5(&Uuid::NAMESPACE_URL, content_hash.as_bytes()),
        content_hash,
        url: ctx.url.clone(),
        cik: filing.cik.clone(),
        company_name: ctx.company.name.clone(),
        accession_number: filing.accession_number.clone(),
        filing_type: filing.form_type.clone(),
        filing_date: filing.filing_date,
        period_of_report: filing.period_of_report,
        fiscal_year: filing.period_of_report.map(|d| d.year()),
        fetched_at: ctx.fetched_at,
        title,
        body_text: page.body_text.clone(),
        headings: page.headings.iter().map(|h| h.text.clone()).collect(),
        sections,
        word_count,
        char_count,
        reading_time_minutes: round2(word_count as f64 / cfg.reading_wpm),
        language,
        quality,
        has_tables: page.table_count > 0,
        table_count: page.table_count,
        link_count: page.link_count,
        code_ratio: code_ratio(page.code_char_count, char_count),
        breadcrumbs: page.breadcrumbs.clone(),
        depth_in_site,
        http_status: ctx.http_status,
        content_type: content_type.to_string(),
        tags,
    })
}

/// Lowercase hex SHA-256 of the exact body text.
pub fn content_hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Share of the body inside code blocks, four decimals.
fn code_ratio(code_chars: usize, body_chars: usize) -> f64 {
    if body_chars == 0 {
        return 0.0;
    }
    let ratio = (code_chars as f64 / body_chars as f64).min(1.0);
    (ratio * 10_000.0).round() / 10_000.0
}

/// Non-empty path segments of the document URL.
fn depth_in_site(raw: &str) -> Result<u32, FilingError> {
    let url = Url::parse(raw)
        .map_err(|e| FilingError::Enrichment(format!("document URL {raw:?}: {e}")))?;
    let depth = url
        .path_segments()
        .map_or(0, |segments| segments.filter(|s| !s.is_empty()).count());
    Ok(depth as u32)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ── Tests ──
