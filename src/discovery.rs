use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use crate::error::FilingError;
use crate::model::{normalize_accession, Cik, Company, FilingRef, RunScope};

/// Forms filed by foreign private issuers in place of 10-K / 10-Q / 8-K.
const FOREIGN_ISSUER_FORMS: &[&str] = &["20-F", "6-K", "40-F"];

// ── Identifiers ──

/// A requested company: either a CIK or a ticker to look up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Cik(Cik),
    Ticker(String),
}

impl Identifier {
    pub fn parse(raw: &str) -> Result<Identifier, FilingError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(discovery_error(raw, "empty identifier"));
        }
        if raw.bytes().all(|b| b.is_ascii_digit()) {
            return Cik::parse(raw)
                .map(Identifier::Cik)
                .ok_or_else(|| discovery_error(raw, "CIK has more than 10 digits"));
        }
        Ok(Identifier::Ticker(raw.to_uppercase()))
    }
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    cik_str: u64,
    ticker: String,
}

/// Find a ticker in the `company_tickers.json` document.
pub fn lookup_ticker(json: &str, ticker: &str) -> Result<Option<Cik>, FilingError> {
    let entries: HashMap<String, TickerEntry> = serde_json::from_str(json)
        .map_err(|e| discovery_error(ticker, &format!("malformed ticker map: {e}")))?;
    Ok(entries
        .values()
        .find(|e| e.ticker.eq_ignore_ascii_case(ticker))
        .and_then(|e| Cik::parse(&e.cik_str.to_string())))
}

// ── Submissions payload ──

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Submissions {
    name: String,
    #[serde(default)]
    tickers: Vec<Option<String>>,
    #[serde(default)]
    sic: Option<String>,
    #[serde(default)]
    sic_description: Option<String>,
    filings: Filings,
}

#[derive(Debug, Deserialize)]
struct Filings {
    recent: RecentColumns,
}

/// The history arrives column-wise; index `i` of each column is one filing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentColumns {
    #[serde(default)]
    accession_number: Vec<String>,
    #[serde(default)]
    form: Vec<String>,
    #[serde(default)]
    filing_date: Vec<String>,
    #[serde(default)]
    report_date: Vec<String>,
    #[serde(default)]
    primary_document: Vec<String>,
}

/// Full filing history of one company, decoded from one API response.
#[derive(Debug, Clone)]
pub struct FilingHistory {
    pub company: Company,
    pub filings: Vec<FilingRef>,
}

/// Which filings a run wants from each company.
#[derive(Debug, Clone, PartialEq)]
pub struct FilingFilter {
    pub form_types: Vec<String>,
    pub max_per_company: usize,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl From<&RunScope> for FilingFilter {
    fn from(scope: &RunScope) -> Self {
        Self {
            form_types: scope.filing_types.clone(),
            max_per_company: scope.max_per_company,
            date_from: scope.date_from,
            date_to: scope.date_to,
        }
    }
}

impl FilingFilter {
    fn accepts(&self, filing: &FilingRef) -> bool {
        let form_ok = self.form_types.is_empty()
            || self
                .form_types
                .iter()
                .any(|f| f.trim().eq_ignore_ascii_case(&filing.form_type));
        form_ok
            && self.date_from.map_or(true, |from| filing.filing_date >= from)
            && self.date_to.map_or(true, |to| filing.filing_date <= to)
    }
}

pub fn parse_submissions(cik: &Cik, json: &str) -> Result<FilingHistory, FilingError> {
    let raw: Submissions = serde_json::from_str(json)
        .map_err(|e| discovery_error(cik.as_str(), &format!("malformed submissions payload: {e}")))?;

    let cols = &raw.filings.recent;
    let rows = cols
        .accession_number
        .len()
        .max(cols.form.len())
        .max(cols.filing_date.len());
    let cell = |col: &Vec<String>, i: usize| col.get(i).map(|s| s.trim()).unwrap_or_default().to_string();

    let mut filings = Vec::with_capacity(rows);
    for i in 0..rows {
        let accession_raw = cell(&cols.accession_number, i);
        let Some(accession_number) = normalize_accession(&accession_raw) else {
            warn!(cik = %cik, row = i, accession = %accession_raw, "skipping malformed accession number");
            continue;
        };
        let Ok(filing_date) = NaiveDate::parse_from_str(&cell(&cols.filing_date, i), "%Y-%m-%d") else {
            warn!(cik = %cik, accession = %accession_number, "skipping filing with unparseable date");
            continue;
        };
        let primary_document = cell(&cols.primary_document, i);
        if primary_document.is_empty() {
            warn!(cik = %cik, accession = %accession_number, "skipping filing without primary document");
            continue;
        }
        filings.push(FilingRef {
            cik: cik.clone(),
            accession_number,
            form_type: cell(&cols.form, i),
            filing_date,
            period_of_report: NaiveDate::parse_from_str(&cell(&cols.report_date, i), "%Y-%m-%d").ok(),
            primary_document,
        });
    }

    let company = Company {
        cik: cik.clone(),
        name: raw.name.trim().to_string(),
        tickers: raw.tickers.into_iter().flatten().filter(|t| !t.is_empty()).collect(),
        sic_code: raw.sic.filter(|s| !s.trim().is_empty()),
        sic_description: raw.sic_description.filter(|s| !s.trim().is_empty()),
    };
    Ok(FilingHistory { company, filings })
}

impl FilingHistory {
    /// Matching filings, newest first, at most `max_per_company`. Ties on
    /// filing date keep history order, so the same history always yields
    /// the same sequence.
    pub fn select<'a>(&'a self, filter: &FilingFilter) -> impl Iterator<Item = &'a FilingRef> + 'a {
        let mut matched: Vec<&FilingRef> = self.filings.iter().filter(|f| filter.accepts(f)).collect();
        matched.sort_by(|a, b| b.filing_date.cmp(&a.filing_date));
        matched.into_iter().take(filter.max_per_company)
    }

    /// True when the history holds foreign-private-issuer forms, which
    /// explains an empty selection for domestic form types.
    pub fn has_foreign_issuer_forms(&self) -> bool {
        self.filings.iter().any(|f| {
            FOREIGN_ISSUER_FORMS
                .iter()
                .any(|form| f.form_type.eq_ignore_ascii_case(form))
        })
    }
}

fn discovery_error(identifier: &str, message: &str) -> FilingError {
    FilingError::Discovery {
        identifier: identifier.to_string(),
        message: message.to_string(),
    }
}

// ── Tests ──
