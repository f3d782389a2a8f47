use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enrich::items::ItemTag;

// ── Companies ──

/// Zero-padded 10-digit Central Index Key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cik(String);

impl Cik {
    /// Normalize a numeric identifier ("320193", "0000320193") to 10 digits.
    pub fn parse(raw: &str) -> Option<Cik> {
        let raw = raw.trim();
        if raw.is_empty() || raw.len() > 10 || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Cik(format!("{:0>10}", raw)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Archive paths use the CIK without leading zeros.
    pub fn unpadded(&self) -> &str {
        let trimmed = self.0.trim_start_matches('0');
        if trimmed.is_empty() {
            "0"
        } else {
            trimmed
        }
    }
}

impl fmt::Display for Cik {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub cik: Cik,
    pub name: String,
    pub tickers: Vec<String>,
    pub sic_code: Option<String>,
    pub sic_description: Option<String>,
}

// ── Filings ──

/// Pointer to one retrievable filing document, produced by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRef {
    pub cik: Cik,
    pub accession_number: String,
    pub form_type: String,
    pub filing_date: NaiveDate,
    pub period_of_report: Option<NaiveDate>,
    pub primary_document: String,
}

impl FilingRef {
    pub fn document_url(&self, archives_base: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            archives_base.trim_end_matches('/'),
            self.cik.unpadded(),
            self.accession_number.replace('-', ""),
            self.primary_document
        )
    }
}

/// Normalize an accession number to `NNNNNNNNNN-NN-NNNNNN`.
pub fn normalize_accession(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| *c != '-').collect();
    if digits.len() != 18 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}-{}-{}", &digits[..10], &digits[10..12], &digits[12..]))
}

/// Everything the enricher knows about a filing besides its extracted page.
#[derive(Debug, Clone)]
pub struct FilingContext {
    pub filing: FilingRef,
    pub company: Company,
    pub url: String,
    pub fetched_at: DateTime<Utc>,
    pub http_status: u16,
}

// ── Extraction ──

#[derive(Debug, Clone, PartialEq)]
pub struct PageHeading {
    pub level: u8,
    pub text: String,
    /// Byte offset of `text` inside the page body.
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    pub title: Option<String>,
    pub body_text: String,
    pub headings: Vec<PageHeading>,
    pub raw_char_count: usize,
    /// Visible characters inside `pre`/`code` blocks.
    pub code_char_count: usize,
    pub table_count: usize,
    pub link_count: usize,
    pub breadcrumbs: Vec<String>,
}

// ── Documents ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub position: u32,
    pub level: u8,
    pub heading: String,
    pub body_text: String,
    pub word_count: usize,
    pub char_count: usize,
    pub item: Option<ItemTag>,
}

/// The four stored quality components plus their weighted composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub length: f64,
    pub lang_confidence: f64,
    pub density: f64,
    pub structure: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub content_hash: String,
    pub url: String,
    pub cik: Cik,
    pub company_name: String,
    pub accession_number: String,
    pub filing_type: String,
    pub filing_date: NaiveDate,
    pub period_of_report: Option<NaiveDate>,
    pub fiscal_year: Option<i32>,
    pub fetched_at: DateTime<Utc>,
    pub title: String,
    pub body_text: String,
    pub headings: Vec<String>,
    pub sections: Vec<Section>,
    pub word_count: usize,
    pub char_count: usize,
    pub reading_time_minutes: f64,
    pub language: String,
    pub quality: QualityScore,
    pub has_tables: bool,
    pub table_count: usize,
    pub link_count: usize,
    pub code_ratio: f64,
    pub breadcrumbs: Vec<String>,
    pub depth_in_site: u32,
    pub http_status: u16,
    pub content_type: String,
    pub tags: Vec<String>,
}

// ── Runs ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<RunStatus> {
        match s {
            "pending" => Some(RunStatus::Pending),
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "partial" => Some(RunStatus::Partial),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Partial | RunStatus::Failed)
    }

    /// Terminal status for a run whose work list is exhausted (or aborted).
    pub fn conclude(counters: &RunCounters, no_work_formed: bool) -> RunStatus {
        if no_work_formed {
            RunStatus::Failed
        } else if counters.pages_errored == 0 {
            RunStatus::Completed
        } else if counters.pages_saved + counters.pages_skipped > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        }
    }
}

/// What a run was asked to crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunScope {
    pub identifiers: Vec<String>,
    pub filing_types: Vec<String>,
    pub max_per_company: usize,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub pages_crawled: u64,
    pub pages_saved: u64,
    pub pages_skipped: u64,
    pub pages_errored: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub scope: RunScope,
    pub counters: RunCounters,
    pub error_summary: Option<String>,
    pub errors: Vec<CrawlError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlError {
    pub seq: u32,
    pub url: String,
    pub kind: String,
    pub http_status: Option<u16>,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cik_pads_and_unpads() {
        let cik = Cik::parse("320193").unwrap();
        assert_eq!(cik.as_str(), "0000320193");
        assert_eq!(cik.unpadded(), "320193");
        assert_eq!(Cik::parse("0000000000").unwrap().unpadded(), "0");
    }

    #[test]
    fn cik_rejects_non_numeric_and_overlong() {
        assert!(Cik::parse("AAPL").is_none());
        assert!(Cik::parse("12345678901").is_none());
        assert!(Cik::parse("").is_none());
    }

    #[test]
    fn accession_normalization() {
        assert_eq!(
            normalize_accession("000032019323000106").as_deref(),
            Some("0000320193-23-000106")
        );
        assert_eq!(
            normalize_accession("0000320193-23-000106").as_deref(),
            Some("0000320193-23-000106")
        );
        assert!(normalize_accession("0000320193-23").is_none());
    }

    #[test]
    fn document_url_uses_unpadded_cik_and_bare_accession() {
        let filing = FilingRef {
            cik: Cik::parse("320193").unwrap(),
            accession_number: "0000320193-23-000106".into(),
            form_type: "10-K".into(),
            filing_date: NaiveDate::from_ymd_opt(2023, 11, 3).unwrap(),
            period_of_report: None,
            primary_document: "aapl-20230930.htm".into(),
        };
        assert_eq!(
            filing.document_url("https://www.sec.gov/Archives/edgar/data/"),
            "https://www.sec.gov/Archives/edgar/data/320193/000032019323000106/aapl-20230930.htm"
        );
    }

    #[test]
    fn status_conclusion() {
        let mut c = RunCounters::default();
        assert_eq!(RunStatus::conclude(&c, false), RunStatus::Completed);
        assert_eq!(RunStatus::conclude(&c, true), RunStatus::Failed);
        c.pages_errored = 1;
        assert_eq!(RunStatus::conclude(&c, false), RunStatus::Failed);
        c.pages_skipped = 1;
        assert_eq!(RunStatus::conclude(&c, false), RunStatus::Partial);
        assert!(RunStatus::Partial.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }
}
