use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{Config, EnrichConfig};
use crate::db::{Counter, Store};
use crate::discovery::FilingFilter;
use crate::enrich::{self, items};
use crate::error::FilingError;
use crate::fetch::{Coordinator, SeenUrls, Transport};
use crate::model::{Cik, Company, Document, FilingContext, FilingRef, Run, RunCounters, RunScope, RunStatus};
use crate::parser::Extractor;
use crate::writer::{self, WriteOutcome};

// ── Progress ──

/// Live counters for a run in flight. The store holds the durable copy.
#[derive(Debug, Default)]
pub struct Progress {
    pub queued: AtomicU64,
    pub crawled: AtomicU64,
    pub saved: AtomicU64,
    pub skipped: AtomicU64,
    pub errored: AtomicU64,
}

impl Progress {
    fn add(&self, counter: Counter) {
        let cell = match counter {
            Counter::Crawled => &self.crawled,
            Counter::Saved => &self.saved,
            Counter::Skipped => &self.skipped,
            Counter::Errored => &self.errored,
        };
        cell.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunCounters {
        RunCounters {
            pages_crawled: self.crawled.load(Ordering::Relaxed),
            pages_saved: self.saved.load(Ordering::Relaxed),
            pages_skipped: self.skipped.load(Ordering::Relaxed),
            pages_errored: self.errored.load(Ordering::Relaxed),
        }
    }
}

// ── Run handle ──

/// A started run. Dropping the handle does not stop the run.
pub struct RunHandle {
    pub run_id: Uuid,
    pub progress: Arc<Progress>,
    cancel: CancellationToken,
    join: JoinHandle<Result<Run>>,
}

impl RunHandle {
    /// Stop issuing fetches. Requests already in flight finish and are written.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn wait(self) -> Result<Run> {
        self.join.await.context("run task panicked")?
    }
}

// ── Pipeline ──

/// What one filing task hands back to the writer loop.
enum TaskOutcome {
    AlreadySeen,
    Processed(Box<Document>),
    Failed {
        url: String,
        error: FilingError,
        fetched: bool,
    },
    Cancelled,
}

#[derive(Clone)]
pub struct Pipeline {
    store: Store,
    transport: Arc<dyn Transport>,
    config: Config,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(store: Store, transport: Arc<dyn Transport>, config: Config) -> Self {
        Self {
            store,
            transport,
            config,
            show_progress: false,
        }
    }

    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Start a run and wait for it to finish.
    pub async fn run(&self, scope: RunScope) -> Result<Run> {
        self.start_run(scope)?.wait().await
    }

    /// Create the run row and return at once; the work happens on a spawned task.
    pub fn start_run(&self, scope: RunScope) -> Result<RunHandle> {
        let seen = SeenUrls::new(self.store.document_urls()?);
        self.spawn_run(scope, seen)
    }

    pub(crate) fn spawn_run(&self, scope: RunScope, seen: SeenUrls) -> Result<RunHandle> {
        let run_id = Uuid::new_v4();
        self.store.create_run(run_id, &scope, Utc::now())?;
        info!(%run_id, companies = scope.identifiers.len(), forms = ?scope.filing_types, "run started");

        let progress = Arc::new(Progress::default());
        let cancel = CancellationToken::new();
        let join = {
            let pipeline = self.clone();
            let progress = Arc::clone(&progress);
            let cancel = cancel.clone();
            tokio::spawn(async move { pipeline.drive(run_id, scope, seen, progress, cancel).await })
        };

        Ok(RunHandle {
            run_id,
            progress,
            cancel,
            join,
        })
    }

    /// Execute the run and always leave it in a terminal state.
    async fn drive(
        self,
        run_id: Uuid,
        scope: RunScope,
        seen: SeenUrls,
        progress: Arc<Progress>,
        cancel: CancellationToken,
    ) -> Result<Run> {
        let (status, summary) = match self.execute(run_id, &scope, seen, &progress, &cancel).await {
            Ok(concluded) => concluded,
            Err(e) => {
                warn!(%run_id, "run aborted: {:#}", e);
                (RunStatus::Failed, Some(format!("{e:#}")))
            }
        };
        self.store
            .finish_run(run_id, status, Utc::now(), summary.as_deref())?;

        let run = self
            .store
            .get_run(run_id)?
            .with_context(|| format!("run {run_id} vanished"))?;
        info!(
            %run_id,
            status = run.status.as_str(),
            crawled = run.counters.pages_crawled,
            saved = run.counters.pages_saved,
            skipped = run.counters.pages_skipped,
            errored = run.counters.pages_errored,
            "run finished"
        );
        Ok(run)
    }

    async fn execute(
        &self,
        run_id: Uuid,
        scope: &RunScope,
        seen: SeenUrls,
        progress: &Progress,
        cancel: &CancellationToken,
    ) -> Result<(RunStatus, Option<String>)> {
        let coordinator = Arc::new(Coordinator::new(
            Arc::clone(&self.transport),
            &self.config.fetch,
            self.config.endpoints.clone(),
            seen,
        ));
        let filter = FilingFilter::from(scope);

        // Discovery: one company at a time, under the same budget as fetches.
        let mut work: Vec<(FilingRef, Company)> = Vec::new();
        let mut discovered = 0usize;
        let mut discovery_failures = 0u64;
        for identifier in &scope.identifiers {
            if cancel.is_cancelled() {
                break;
            }
            match coordinator.discover(identifier, &filter).await {
                Ok(found) => {
                    let company = self.store.upsert_company(&found.company)?;
                    discovered += 1;
                    work.extend(found.filings.into_iter().map(|f| (f, company.clone())));
                }
                Err(e) => {
                    let url = discovery_url(&coordinator, identifier);
                    writer::record_failure(&self.store, run_id, &url, &e)?;
                    progress.add(Counter::Errored);
                    discovery_failures += 1;
                }
            }
        }

        if cancel.is_cancelled() && work.is_empty() {
            return Ok(conclude_cancelled(&progress.snapshot()));
        }
        let no_work_formed = !scope.identifiers.is_empty() && discovered == 0;
        if no_work_formed {
            let summary = format!(
                "discovery failed for all {} requested companies",
                scope.identifiers.len()
            );
            return Ok((RunStatus::conclude(&progress.snapshot(), true), Some(summary)));
        }

        info!(%run_id, filings = work.len(), companies = discovered, "work list formed");
        progress.queued.store(work.len() as u64, Ordering::Relaxed);

        let pb = if self.show_progress {
            ProgressBar::new(work.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
                .progress_chars("=> "),
        );

        // Tasks fetch, extract and enrich; this loop is the only writer.
        let capacity = self.config.fetch.max_in_flight.max(1) * 2;
        let (tx, mut rx) = tokio::sync::mpsc::channel::<TaskOutcome>(capacity);
        for (filing, company) in work {
            let coordinator = Arc::clone(&coordinator);
            let cancel = cancel.clone();
            let enrich_cfg = self.config.enrich.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = process_filing(&coordinator, &cancel, &enrich_cfg, filing, company).await;
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let mut cancelled = 0u64;
        while let Some(outcome) = rx.recv().await {
            match outcome {
                TaskOutcome::AlreadySeen => {
                    self.store.bump(run_id, Counter::Skipped)?;
                    progress.add(Counter::Skipped);
                }
                TaskOutcome::Processed(doc) => {
                    self.store.bump(run_id, Counter::Crawled)?;
                    progress.add(Counter::Crawled);
                    match writer::write(&self.store, run_id, &doc) {
                        Ok(WriteOutcome::Stored) => progress.add(Counter::Saved),
                        Ok(WriteOutcome::Deduplicated) => progress.add(Counter::Skipped),
                        Err(e) => {
                            writer::record_failure(&self.store, run_id, &doc.url, &e)?;
                            progress.add(Counter::Errored);
                        }
                    }
                }
                TaskOutcome::Failed { url, error, fetched } => {
                    if fetched {
                        self.store.bump(run_id, Counter::Crawled)?;
                        progress.add(Counter::Crawled);
                    }
                    writer::record_failure(&self.store, run_id, &url, &error)?;
                    progress.add(if error.is_skip() { Counter::Skipped } else { Counter::Errored });
                }
                TaskOutcome::Cancelled => cancelled += 1,
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        let counters = self
            .store
            .get_run(run_id)?
            .map(|r| r.counters)
            .unwrap_or_else(|| progress.snapshot());
        if cancelled > 0 || cancel.is_cancelled() {
            info!(%run_id, abandoned = cancelled, "run cancelled");
            return Ok(conclude_cancelled(&counters));
        }

        let status = RunStatus::conclude(&counters, false);
        let summary = (status == RunStatus::Failed).then(|| {
            format!(
                "discovery failed for {} of {} companies, {} filings failed",
                discovery_failures,
                scope.identifiers.len(),
                counters.pages_errored.saturating_sub(discovery_failures)
            )
        });
        Ok((status, summary))
    }
}

/// fetch → extract → enrich for one filing. Never touches the store.
async fn process_filing(
    coordinator: &Coordinator,
    cancel: &CancellationToken,
    enrich_cfg: &EnrichConfig,
    filing: FilingRef,
    company: Company,
) -> TaskOutcome {
    if cancel.is_cancelled() {
        return TaskOutcome::Cancelled;
    }
    let url = coordinator.document_url(&filing);
    if !coordinator.claim(&url) {
        return TaskOutcome::AlreadySeen;
    }

    let resp = match coordinator.fetch(&url, cancel).await {
        Ok(Some(resp)) => resp,
        Ok(None) => return TaskOutcome::Cancelled,
        Err(error) => {
            return TaskOutcome::Failed {
                url,
                error,
                fetched: false,
            }
        }
    };

    let ctx = FilingContext {
        filing,
        company,
        url,
        fetched_at: Utc::now(),
        http_status: resp.status,
    };
    match extract_and_enrich(&resp.body, &ctx, enrich_cfg) {
        Ok(doc) => TaskOutcome::Processed(Box::new(doc)),
        Err(error) => TaskOutcome::Failed {
            url: ctx.url,
            error,
            fetched: true,
        },
    }
}

fn extract_and_enrich(
    raw: &str,
    ctx: &FilingContext,
    cfg: &EnrichConfig,
) -> Result<Document, FilingError> {
    let page = Extractor::new()
        .with_heading_hint(items::is_item_heading)
        .extract(raw)?;
    enrich::enrich(&page, ctx, cfg)
}

fn conclude_cancelled(counters: &RunCounters) -> (RunStatus, Option<String>) {
    if counters.pages_saved + counters.pages_skipped > 0 {
        (RunStatus::Partial, None)
    } else {
        (RunStatus::Failed, Some("cancelled".to_string()))
    }
}

/// The URL a discovery failure is logged against.
fn discovery_url(coordinator: &Coordinator, identifier: &str) -> String {
    match Cik::parse(identifier.trim()) {
        Some(cik) => coordinator.endpoints().submissions_url(&cik),
        None => coordinator.endpoints().tickers_url.clone(),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Endpoints, FetchConfig};
    use crate::fetch::testing::ScriptedTransport;
    use std::time::Duration;

    const SUBMISSIONS_AAPL: &str = "https://data.sec.gov/submissions/CIK0000320193.json";
    const SUBMISSIONS_TSM: &str = "https://data.sec.gov/submissions/CIK0001046179.json";
    const DOC_2023: &str =
        "https://www.sec.gov/Archives/edgar/data/320193/000032019323000106/aapl-20230930.htm";
    const DOC_2022: &str =
        "https://www.sec.gov/Archives/edgar/data/320193/000032019322000108/aapl-20220924.htm";
    const DOC_2021: &str =
        "https://www.sec.gov/Archives/edgar/data/320193/000032019321000105/aapl-20210925.htm";

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
    }

    fn config() -> Config {
        Config {
            db_path: ":memory:".into(),
            endpoints: Endpoints::default(),
            fetch: FetchConfig {
                min_spacing: Duration::ZERO,
                max_retries: 0,
                ..FetchConfig::default()
            },
            enrich: EnrichConfig::default(),
        }
    }

    fn scope(ids: &[&str], forms: &[&str], max: usize) -> RunScope {
        RunScope {
            identifiers: ids.iter().map(|s| s.to_string()).collect(),
            filing_types: forms.iter().map(|s| s.to_string()).collect(),
            max_per_company: max,
            date_from: None,
            date_to: None,
        }
    }

    fn pipeline(store: &Store, transport: &Arc<ScriptedTransport>) -> Pipeline {
        Pipeline::new(store.clone(), Arc::clone(transport) as Arc<dyn Transport>, config())
    }

    #[tokio::test]
    async fn not_found_document_is_one_transport_error() {
        let store = Store::open_in_memory().unwrap();
        let transport = Arc::new(
            ScriptedTransport::new().route(SUBMISSIONS_AAPL, 200, fixture("submissions_aapl.json")),
        );

        let run = pipeline(&store, &transport)
            .run(scope(&["320193"], &["10-K"], 1))
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.counters.pages_errored, 1);
        assert_eq!(run.counters.pages_crawled, 0);
        assert_eq!(run.errors.len(), 1);
        assert_eq!(run.errors[0].kind, "transport_failure");
        assert_eq!(run.errors[0].http_status, Some(404));
        assert_eq!(run.errors[0].url, DOC_2023);
        assert_eq!(store.document_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn identical_bodies_store_one_document() {
        let store = Store::open_in_memory().unwrap();
        let body = fixture("modern_10k.htm");
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(SUBMISSIONS_AAPL, 200, fixture("submissions_aapl.json"))
                .route(DOC_2023, 200, body.clone())
                .route(DOC_2022, 200, body),
        );

        let run = pipeline(&store, &transport)
            .run(scope(&["320193"], &["10-K"], 2))
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.counters.pages_crawled, 2);
        assert_eq!(run.counters.pages_saved, 1);
        assert_eq!(run.counters.pages_skipped, 1);
        assert!(run.errors.is_empty());
        assert_eq!(store.document_count().unwrap(), 1);

        let company = store.get_company(&Cik::parse("320193").unwrap()).unwrap().unwrap();
        assert_eq!(company.name, "Apple Inc.");
    }

    #[tokio::test]
    async fn foreign_issuer_without_matching_forms_completes_empty() {
        let store = Store::open_in_memory().unwrap();
        let transport = Arc::new(
            ScriptedTransport::new().route(SUBMISSIONS_TSM, 200, fixture("submissions_foreign.json")),
        );

        let run = pipeline(&store, &transport)
            .run(scope(&["1046179"], &["10-K"], 5))
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.counters, RunCounters::default());
        assert!(run.errors.is_empty());
        assert_eq!(transport.calls(), vec![SUBMISSIONS_TSM.to_string()]);
    }

    #[tokio::test]
    async fn rerun_stores_nothing_new() {
        let store = Store::open_in_memory().unwrap();
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(SUBMISSIONS_AAPL, 200, fixture("submissions_aapl.json"))
                .route(DOC_2023, 200, fixture("modern_10k.htm"))
                .route(DOC_2022, 200, fixture("legacy_10k.htm")),
        );
        let p = pipeline(&store, &transport);

        let first = p.run(scope(&["320193"], &["10-K"], 2)).await.unwrap();
        assert_eq!(first.counters.pages_saved, 2);
        assert_eq!(store.document_count().unwrap(), 2);

        // Cold seen-URL cache: both documents are fetched again and dedup on content.
        let second = p
            .spawn_run(scope(&["320193"], &["10-K"], 2), SeenUrls::default())
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(second.status, RunStatus::Completed);
        assert_eq!(second.counters.pages_crawled, 2);
        assert_eq!(second.counters.pages_saved, 0);
        assert_eq!(second.counters.pages_skipped, 2);
        assert_eq!(store.document_count().unwrap(), 2);

        // Warm cache: no document fetches at all.
        let fetched_before = transport.calls().len();
        let third = p.run(scope(&["320193"], &["10-K"], 2)).await.unwrap();
        assert_eq!(third.counters.pages_crawled, 0);
        assert_eq!(third.counters.pages_skipped, 2);
        assert_eq!(transport.calls().len(), fetched_before + 1);
    }

    #[tokio::test]
    async fn every_company_failing_discovery_fails_the_run() {
        let store = Store::open_in_memory().unwrap();
        let transport = Arc::new(
            ScriptedTransport::new().route(
                "https://www.sec.gov/files/company_tickers.json",
                200,
                fixture("company_tickers.json"),
            ),
        );

        let run = pipeline(&store, &transport)
            .run(scope(&["320193", "ZZZZ"], &["10-K"], 5))
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error_summary.unwrap().contains("discovery failed"));
        assert_eq!(run.counters.pages_errored, 2);
        let kinds: Vec<&str> = run.errors.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["discovery_failure", "discovery_failure"]);
        assert_eq!(run.errors[0].url, SUBMISSIONS_AAPL);
        assert_eq!(run.errors[1].url, "https://www.sec.gov/files/company_tickers.json");
    }

    #[tokio::test]
    async fn one_failing_company_does_not_stop_the_others() {
        let store = Store::open_in_memory().unwrap();
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(SUBMISSIONS_AAPL, 200, fixture("submissions_aapl.json"))
                .route(DOC_2023, 200, fixture("modern_10k.htm")),
        );

        let run = pipeline(&store, &transport)
            .run(scope(&["320193", "999999"], &["10-K"], 1))
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Partial);
        assert_eq!(run.counters.pages_saved, 1);
        assert_eq!(run.counters.pages_errored, 1);
    }

    #[tokio::test]
    async fn failed_run_summary_counts_discovery_and_filings_apart() {
        let store = Store::open_in_memory().unwrap();
        let transport = Arc::new(
            ScriptedTransport::new().route(SUBMISSIONS_TSM, 200, fixture("submissions_foreign.json")),
        );

        let run = pipeline(&store, &transport)
            .run(scope(&["1046179", "999"], &["10-K"], 5))
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.counters.pages_errored, 1);
        assert_eq!(
            run.error_summary.as_deref(),
            Some("discovery failed for 1 of 2 companies, 0 filings failed")
        );
    }

    #[tokio::test]
    async fn stored_document_records_fetch_signals() {
        let store = Store::open_in_memory().unwrap();
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(SUBMISSIONS_AAPL, 200, fixture("submissions_aapl.json"))
                .route(DOC_2023, 200, fixture("modern_10k.htm")),
        );

        pipeline(&store, &transport)
            .run(scope(&["320193"], &["10-K"], 1))
            .await
            .unwrap();

        let mut out = Vec::new();
        assert_eq!(store.export_documents(&mut out, None).unwrap(), 1);
        let exported: Document = serde_json::from_slice(out.trim_ascii_end()).unwrap();
        let doc = store.get_document(exported.id).unwrap().unwrap();
        assert_eq!(doc.http_status, 200);
        assert_eq!(doc.depth_in_site, 6);
        assert_eq!(doc.code_ratio, 0.0);
        assert_eq!(doc.url, DOC_2023);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_mid_run_keeps_written_work_and_stops_new_fetches() {
        let store = Store::open_in_memory().unwrap();
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(SUBMISSIONS_AAPL, 200, fixture("submissions_aapl.json"))
                .route(DOC_2023, 200, fixture("modern_10k.htm"))
                .route(DOC_2022, 200, fixture("legacy_10k.htm"))
                .route(DOC_2021, 200, fixture("modern_10k.htm")),
        );
        let mut cfg = config();
        cfg.fetch.max_in_flight = 1;
        cfg.fetch.min_spacing = Duration::from_millis(200);
        let p = Pipeline::new(store.clone(), Arc::clone(&transport) as Arc<dyn Transport>, cfg);

        let handle = p.start_run(scope(&["320193"], &["10-K"], 3)).unwrap();
        while handle.progress.saved.load(Ordering::Relaxed) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.cancel();
        let run = handle.wait().await.unwrap();

        assert_eq!(run.status, RunStatus::Partial);
        assert_eq!(run.counters.pages_saved, 1);
        assert_eq!(run.counters.pages_crawled, 1);
        assert_eq!(run.counters.pages_errored, 0);
        assert_eq!(run.error_summary, None);
        assert_eq!(store.document_count().unwrap(), 1);

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], SUBMISSIONS_AAPL);
        let fetched_docs = [DOC_2023, DOC_2022, DOC_2021]
            .iter()
            .filter(|url| calls.iter().any(|c| c == *url))
            .count();
        assert_eq!(fetched_docs, 1);
    }

    #[tokio::test]
    async fn thin_page_is_a_skip_not_an_error() {
        let store = Store::open_in_memory().unwrap();
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(SUBMISSIONS_AAPL, 200, fixture("submissions_aapl.json"))
                .route(DOC_2023, 200, fixture("thin_index.htm")),
        );

        let run = pipeline(&store, &transport)
            .run(scope(&["320193"], &["10-K"], 1))
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.counters.pages_crawled, 1);
        assert_eq!(run.counters.pages_skipped, 1);
        assert_eq!(run.errors[0].kind, "not_extractable");
        assert_eq!(store.document_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn cancelled_before_start_fails_with_summary() {
        let store = Store::open_in_memory().unwrap();
        let transport = Arc::new(
            ScriptedTransport::new().route(SUBMISSIONS_AAPL, 200, fixture("submissions_aapl.json")),
        );

        let handle = pipeline(&store, &transport)
            .start_run(scope(&["320193"], &["10-K"], 5))
            .unwrap();
        let run_id = handle.run_id;
        handle.cancel();
        let run = handle.wait().await.unwrap();

        assert_eq!(run.run_id, run_id);
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_summary.as_deref(), Some("cancelled"));
        assert!(run.finished_at.is_some());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn start_run_returns_before_work_completes() {
        let store = Store::open_in_memory().unwrap();
        let transport = Arc::new(
            ScriptedTransport::new().route(SUBMISSIONS_TSM, 200, fixture("submissions_foreign.json")),
        );

        let handle = pipeline(&store, &transport)
            .start_run(scope(&["1046179"], &["20-F"], 1))
            .unwrap();
        let pending = store.get_run(handle.run_id).unwrap().unwrap();
        assert_eq!(pending.status, RunStatus::Running);
        assert!(pending.finished_at.is_none());

        let done = handle.wait().await.unwrap();
        assert!(done.status.is_terminal());
    }
}
