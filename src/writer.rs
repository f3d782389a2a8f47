use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::{self, Counter, NewCrawlError, Store};
use crate::error::FilingError;
use crate::model::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Stored,
    Deduplicated,
}

/// Persist one finalized document. The insert, its sections and the run
/// counter move together in one transaction; a content hash that is already
/// stored resolves to `Deduplicated` and only bumps `pages_skipped`.
pub fn write(store: &Store, run_id: Uuid, doc: &Document) -> Result<WriteOutcome, FilingError> {
    let outcome = store.write_tx(|tx| -> Result<WriteOutcome, FilingError> {
        if db::insert_document(tx, run_id, doc)? {
            db::bump_counter(tx, run_id, Counter::Saved)?;
            Ok(WriteOutcome::Stored)
        } else {
            db::bump_counter(tx, run_id, Counter::Skipped)?;
            Ok(WriteOutcome::Deduplicated)
        }
    })?;

    match outcome {
        WriteOutcome::Stored => debug!(url = %doc.url, id = %doc.id, "document stored"),
        WriteOutcome::Deduplicated => {
            debug!(url = %doc.url, hash = %doc.content_hash, "content already stored")
        }
    }
    Ok(outcome)
}

/// Record a per-filing failure on the run. Skips (thin pages, duplicate
/// content) bump `pages_skipped`; everything else bumps `pages_errored`.
/// Every kind except WriteConflict is appended to the error log.
pub fn record_failure(store: &Store, run_id: Uuid, url: &str, err: &FilingError) -> Result<(), FilingError> {
    if err.is_skip() {
        debug!(url, kind = err.kind().as_str(), "{}", err);
    } else {
        warn!(url, kind = err.kind().as_str(), "{}", err);
    }

    let message = err.to_string();
    store.write_tx(|tx| {
        if err.is_logged() {
            db::append_error(
                tx,
                run_id,
                &NewCrawlError {
                    url,
                    kind: err.kind().as_str(),
                    http_status: err.http_status(),
                    message: &message,
                    occurred_at: Utc::now(),
                },
            )?;
        }
        let counter = if err.is_skip() { Counter::Skipped } else { Counter::Errored };
        db::bump_counter(tx, run_id, counter)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnrichConfig;
    use crate::enrich::enrich;
    use crate::model::{Cik, Company, ExtractedPage, FilingContext, FilingRef, PageHeading, RunScope};
    use chrono::{NaiveDate, TimeZone};
    use std::sync::{Arc, Barrier};

    const PARA: &str = "The Company designs, manufactures and markets smartphones, personal computers, \
        tablets, wearables and accessories, and sells a variety of related services.";

    fn company() -> Company {
        Company {
            cik: Cik::parse("320193").unwrap(),
            name: "Apple Inc.".into(),
            tickers: vec!["AAPL".into()],
            sic_code: Some("3571".into()),
            sic_description: None,
        }
    }

    fn setup() -> (Store, Uuid) {
        let store = Store::open_in_memory().unwrap();
        let run_id = Uuid::new_v4();
        let scope = RunScope {
            identifiers: vec!["320193".into()],
            filing_types: vec!["10-K".into()],
            max_per_company: 5,
            date_from: None,
            date_to: None,
        };
        store.create_run(run_id, &scope, Utc::now()).unwrap();
        store.upsert_company(&company()).unwrap();
        (store, run_id)
    }

    fn document(accession: &str, url: &str) -> Document {
        let heading = "Item 1. Business";
        let body = format!("{heading}\n{PARA}");
        let page = ExtractedPage {
            title: None,
            headings: vec![PageHeading { level: 2, text: heading.into(), offset: 0 }],
            body_text: body,
            raw_char_count: 4_000,
            table_count: 0,
            link_count: 0,
            code_char_count: 0,
            breadcrumbs: Vec::new(),
        };
        let ctx = FilingContext {
            filing: FilingRef {
                cik: Cik::parse("320193").unwrap(),
                accession_number: accession.into(),
                form_type: "10-K".into(),
                filing_date: NaiveDate::from_ymd_opt(2023, 11, 3).unwrap(),
                period_of_report: None,
                primary_document: "doc.htm".into(),
            },
            company: company(),
            url: url.into(),
            fetched_at: Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap(),
            http_status: 200,
        };
        enrich(&page, &ctx, &EnrichConfig::default()).unwrap()
    }

    #[test]
    fn stores_then_deduplicates_identical_content() {
        let (store, run_id) = setup();
        let first = document("0000320193-23-000106", "https://www.sec.gov/a.htm");
        let second = document("0000320193-23-000107", "https://www.sec.gov/b.htm");
        assert_eq!(first.content_hash, second.content_hash);

        assert_eq!(write(&store, run_id, &first).unwrap(), WriteOutcome::Stored);
        assert_eq!(write(&store, run_id, &second).unwrap(), WriteOutcome::Deduplicated);

        assert_eq!(store.document_count().unwrap(), 1);
        let run = store.get_run(run_id).unwrap().unwrap();
        assert_eq!(run.counters.pages_saved, 1);
        assert_eq!(run.counters.pages_skipped, 1);
        assert!(run.errors.is_empty());

        let stored = store.get_document(first.id).unwrap().unwrap();
        assert_eq!(stored, first);
        assert_eq!(stored.url, "https://www.sec.gov/a.htm");
    }

    #[test]
    fn separate_handles_racing_on_one_hash_store_once() {
        let dir = std::env::temp_dir().join(format!("edgar_ingest_{}", Uuid::new_v4()));
        let path = dir.join("edgar.sqlite");
        let path = path.to_str().unwrap().to_string();

        let store = Store::open(&path).unwrap();
        let run_id = Uuid::new_v4();
        let scope = RunScope {
            identifiers: vec!["320193".into()],
            filing_types: vec!["10-K".into()],
            max_per_company: 8,
            date_from: None,
            date_to: None,
        };
        store.create_run(run_id, &scope, Utc::now()).unwrap();
        store.upsert_company(&company()).unwrap();

        let writers = 8;
        let barrier = Arc::new(Barrier::new(writers));
        let threads: Vec<_> = (0..writers)
            .map(|i| {
                let handle = Store::open(&path).unwrap();
                let doc = document(
                    &format!("0000320193-23-{:06}", 200 + i),
                    &format!("https://www.sec.gov/race-{i}.htm"),
                );
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    write(&handle, run_id, &doc).unwrap()
                })
            })
            .collect();
        let outcomes: Vec<WriteOutcome> = threads.into_iter().map(|t| t.join().unwrap()).collect();

        let stored = outcomes.iter().filter(|o| **o == WriteOutcome::Stored).count();
        assert_eq!(stored, 1);
        assert_eq!(outcomes.len() - stored, writers - 1);
        assert_eq!(store.document_count().unwrap(), 1);
        let run = store.get_run(run_id).unwrap().unwrap();
        assert_eq!(run.counters.pages_saved, 1);
        assert_eq!(run.counters.pages_skipped, (writers - 1) as u64);

        drop(store);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn failures_are_logged_and_counted() {
        let (store, run_id) = setup();
        let url = "https://www.sec.gov/missing.htm";
        record_failure(
            &store,
            run_id,
            url,
            &FilingError::Transport { status: Some(404), message: "gone".into() },
        )
        .unwrap();
        record_failure(
            &store,
            run_id,
            url,
            &FilingError::NotExtractable { best_chars: 40, min_chars: 200 },
        )
        .unwrap();
        record_failure(
            &store,
            run_id,
            url,
            &FilingError::WriteConflict { content_hash: "abc".into() },
        )
        .unwrap();

        let run = store.get_run(run_id).unwrap().unwrap();
        assert_eq!(run.counters.pages_errored, 1);
        assert_eq!(run.counters.pages_skipped, 2);
        let kinds: Vec<&str> = run.errors.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["transport_failure", "not_extractable"]);
        assert_eq!(run.errors[0].http_status, Some(404));
    }
}
