use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::enrich::items::ItemTag;
use crate::model::{
    Cik, Company, CrawlError, Document, QualityScore, Run, RunCounters, RunScope, RunStatus,
    Section,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared handle to the SQLite database. Clones share one connection; the
/// guard is never held across an await.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &str) -> Result<Self> {
        if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating database directory {}", dir.display()))?;
        }
        let conn = Connection::open(path).with_context(|| format!("opening {path}"))?;
        // Other handles may hold the file; wait on them from the first statement.
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::setup(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::setup(conn)
    }

    fn setup(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` inside an IMMEDIATE transaction: the write lock is taken up
    /// front, so concurrent writers serialize instead of failing on upgrade.
    pub fn write_tx<T, E>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    // ── Companies ──

    pub fn upsert_company(&self, company: &Company) -> Result<Company> {
        Ok(self.write_tx(|tx| upsert_company(tx, company))?)
    }

    pub fn get_company(&self, cik: &Cik) -> Result<Option<Company>> {
        Ok(get_company(&self.conn(), cik)?)
    }

    // ── Runs ──

    pub fn create_run(&self, run_id: Uuid, scope: &RunScope, started_at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "INSERT INTO runs (run_id, started_at, status, identifiers, filing_types,
                               max_per_company, date_from, date_to)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run_id.to_string(),
                started_at,
                RunStatus::Running.as_str(),
                to_json(&scope.identifiers)?,
                to_json(&scope.filing_types)?,
                scope.max_per_company,
                scope.date_from,
                scope.date_to,
            ],
        )?;
        Ok(())
    }

    pub fn bump(&self, run_id: Uuid, counter: Counter) -> Result<()> {
        bump_counter(&self.conn(), run_id, counter)?;
        Ok(())
    }

    pub fn finish_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        finished_at: DateTime<Utc>,
        error_summary: Option<&str>,
    ) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE runs SET status = ?2, finished_at = ?3, error_summary = ?4
             WHERE run_id = ?1 AND status = 'running'",
            params![run_id.to_string(), status.as_str(), finished_at, error_summary],
        )?;
        anyhow::ensure!(changed == 1, "run {run_id} is not running");
        Ok(())
    }

    pub fn get_run(&self, run_id: Uuid) -> Result<Option<Run>> {
        let conn = self.conn();
        let Some(mut run) = conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs WHERE run_id = ?1"),
                params![run_id.to_string()],
                run_from_row,
            )
            .optional()?
        else {
            return Ok(None);
        };
        let mut stmt = conn.prepare(
            "SELECT seq, url, kind, http_status, message, occurred_at
             FROM crawl_errors WHERE run_id = ?1 ORDER BY seq",
        )?;
        run.errors = stmt
            .query_map(params![run_id.to_string()], |row| {
                Ok(CrawlError {
                    seq: row.get(0)?,
                    url: row.get(1)?,
                    kind: row.get(2)?,
                    http_status: row.get(3)?,
                    message: row.get(4)?,
                    occurred_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(run))
    }

    /// Most recent runs first, without their error logs.
    pub fn list_runs(&self, limit: usize) -> Result<Vec<Run>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM runs ORDER BY started_at DESC LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![limit], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Documents ──

    /// Every stored source URL; seeds the per-run seen cache.
    pub fn document_urls(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT DISTINCT url FROM documents")?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        let conn = self.conn();
        let doc = conn
            .query_row(
                &format!("SELECT {DOC_COLUMNS} FROM documents WHERE id = ?1"),
                params![id.to_string()],
                document_from_row,
            )
            .optional()?;
        match doc {
            Some(mut doc) => {
                doc.sections = load_sections(&conn, id)?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    pub fn document_count(&self) -> Result<u64> {
        Ok(self
            .conn()
            .query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?)
    }

    /// Write documents (with sections) as JSON lines, newest filings first.
    pub fn export_documents(&self, mut out: impl Write, filing_type: Option<&str>) -> Result<usize> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DOC_COLUMNS} FROM documents
             WHERE ?1 IS NULL OR filing_type = ?1
             ORDER BY filing_date DESC, accession_number"
        ))?;
        let mut rows = stmt.query(params![filing_type])?;
        let mut count = 0;
        while let Some(row) = rows.next()? {
            let mut doc = document_from_row(row)?;
            doc.sections = load_sections(&conn, doc.id)?;
            serde_json::to_writer(&mut out, &doc)?;
            out.write_all(b"\n")?;
            count += 1;
        }
        out.flush()?;
        Ok(count)
    }

    // ── Stats ──

    pub fn stats(&self) -> Result<Stats> {
        let conn = self.conn();
        let count = |sql: &str| -> rusqlite::Result<u64> { conn.query_row(sql, [], |r| r.get(0)) };
        let grouped = |sql: &str| -> rusqlite::Result<Vec<(String, u64)>> {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
                .collect::<Result<Vec<_>, _>>();
            rows
        };

        Ok(Stats {
            documents: count("SELECT COUNT(*) FROM documents")?,
            sections: count("SELECT COUNT(*) FROM sections")?,
            companies: count("SELECT COUNT(*) FROM companies")?,
            runs: count("SELECT COUNT(*) FROM runs")?,
            total_words: count("SELECT COALESCE(SUM(word_count), 0) FROM documents")?,
            avg_quality: conn.query_row("SELECT AVG(quality_score) FROM documents", [], |r| r.get(0))?,
            by_filing_type: grouped(
                "SELECT filing_type, COUNT(*) FROM documents GROUP BY filing_type ORDER BY 2 DESC, 1",
            )?,
            by_language: grouped(
                "SELECT language, COUNT(*) FROM documents GROUP BY language ORDER BY 2 DESC, 1",
            )?,
            by_item: grouped(
                "SELECT item_tag, COUNT(*) FROM sections WHERE item_tag IS NOT NULL
                 GROUP BY item_tag ORDER BY 2 DESC, 1",
            )?,
            errors_by_kind: grouped(
                "SELECT kind, COUNT(*) FROM crawl_errors GROUP BY kind ORDER BY 2 DESC, 1",
            )?,
        })
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS companies (
            cik             TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            tickers         TEXT NOT NULL DEFAULT '[]',
            sic_code        TEXT,
            sic_description TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS runs (
            run_id          TEXT PRIMARY KEY,
            started_at      TEXT NOT NULL,
            finished_at     TEXT,
            status          TEXT NOT NULL
                            CHECK(status IN ('pending','running','completed','partial','failed')),
            identifiers     TEXT NOT NULL,
            filing_types    TEXT NOT NULL,
            max_per_company INTEGER NOT NULL,
            date_from       TEXT,
            date_to         TEXT,
            pages_crawled   INTEGER NOT NULL DEFAULT 0,
            pages_saved     INTEGER NOT NULL DEFAULT 0,
            pages_skipped   INTEGER NOT NULL DEFAULT 0,
            pages_errored   INTEGER NOT NULL DEFAULT 0,
            error_summary   TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_runs_started ON runs(started_at);

        CREATE TABLE IF NOT EXISTS documents (
            id                   TEXT PRIMARY KEY,
            content_hash         TEXT NOT NULL UNIQUE,
            run_id               TEXT NOT NULL REFERENCES runs(run_id),
            cik                  TEXT NOT NULL REFERENCES companies(cik),
            company_name         TEXT NOT NULL,
            url                  TEXT NOT NULL,
            accession_number     TEXT NOT NULL,
            filing_type          TEXT NOT NULL,
            filing_date          TEXT NOT NULL,
            period_of_report     TEXT,
            fiscal_year          INTEGER,
            fetched_at           TEXT NOT NULL,
            title                TEXT NOT NULL,
            body_text            TEXT NOT NULL,
            headings             TEXT NOT NULL,
            word_count           INTEGER NOT NULL,
            char_count           INTEGER NOT NULL,
            reading_time_minutes REAL NOT NULL,
            language             TEXT NOT NULL,
            length_score         REAL NOT NULL,
            lang_confidence      REAL NOT NULL,
            density_score        REAL NOT NULL,
            structure_score      REAL NOT NULL,
            quality_score        REAL NOT NULL CHECK(quality_score BETWEEN 0 AND 1),
            has_tables           BOOLEAN NOT NULL,
            table_count          INTEGER NOT NULL,
            link_count           INTEGER NOT NULL,
            code_ratio           REAL NOT NULL,
            breadcrumbs          TEXT NOT NULL,
            depth_in_site        INTEGER NOT NULL,
            http_status          INTEGER NOT NULL,
            content_type         TEXT NOT NULL,
            tags                 TEXT NOT NULL,
            created_at           TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_documents_url ON documents(url);
        CREATE INDEX IF NOT EXISTS idx_documents_cik ON documents(cik);
        CREATE INDEX IF NOT EXISTS idx_documents_accession ON documents(accession_number);
        CREATE INDEX IF NOT EXISTS idx_documents_filing_type ON documents(filing_type);

        CREATE TABLE IF NOT EXISTS sections (
            document_id TEXT NOT NULL REFERENCES documents(id),
            position    INTEGER NOT NULL,
            level       INTEGER NOT NULL,
            heading     TEXT NOT NULL,
            body_text   TEXT NOT NULL,
            word_count  INTEGER NOT NULL,
            char_count  INTEGER NOT NULL,
            item_tag    TEXT,
            PRIMARY KEY (document_id, position)
        );
        CREATE INDEX IF NOT EXISTS idx_sections_item ON sections(item_tag);

        CREATE TABLE IF NOT EXISTS crawl_errors (
            run_id      TEXT NOT NULL REFERENCES runs(run_id),
            seq         INTEGER NOT NULL,
            url         TEXT NOT NULL,
            kind        TEXT NOT NULL,
            http_status INTEGER,
            message     TEXT NOT NULL,
            occurred_at TEXT NOT NULL,
            PRIMARY KEY (run_id, seq)
        );
        ",
    )?;
    Ok(())
}

// ── Run bookkeeping ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Crawled,
    Saved,
    Skipped,
    Errored,
}

impl Counter {
    fn column(&self) -> &'static str {
        match self {
            Counter::Crawled => "pages_crawled",
            Counter::Saved => "pages_saved",
            Counter::Skipped => "pages_skipped",
            Counter::Errored => "pages_errored",
        }
    }
}

pub fn bump_counter(conn: &Connection, run_id: Uuid, counter: Counter) -> rusqlite::Result<()> {
    let col = counter.column();
    conn.execute(
        &format!("UPDATE runs SET {col} = {col} + 1 WHERE run_id = ?1"),
        params![run_id.to_string()],
    )?;
    Ok(())
}

/// A failure about to be logged on a run.
#[derive(Debug, Clone)]
pub struct NewCrawlError<'a> {
    pub url: &'a str,
    pub kind: &'a str,
    pub http_status: Option<u16>,
    pub message: &'a str,
    pub occurred_at: DateTime<Utc>,
}

/// Append to the run's error log; returns the assigned sequence number.
pub fn append_error(conn: &Connection, run_id: Uuid, err: &NewCrawlError<'_>) -> rusqlite::Result<u32> {
    conn.query_row(
        "INSERT INTO crawl_errors (run_id, seq, url, kind, http_status, message, occurred_at)
         SELECT ?1, COALESCE(MAX(seq), 0) + 1, ?2, ?3, ?4, ?5, ?6
         FROM crawl_errors WHERE run_id = ?1
         RETURNING seq",
        params![
            run_id.to_string(),
            err.url,
            err.kind,
            err.http_status,
            err.message,
            err.occurred_at
        ],
        |row| row.get(0),
    )
}

// ── Companies ──

/// Insert a company or merge new tickers into the stored row. The stored
/// name and classification are kept.
pub fn upsert_company(conn: &Connection, company: &Company) -> rusqlite::Result<Company> {
    match get_company(conn, &company.cik)? {
        None => {
            conn.execute(
                "INSERT INTO companies (cik, name, tickers, sic_code, sic_description)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    company.cik.as_str(),
                    company.name,
                    to_json(&company.tickers)?,
                    company.sic_code,
                    company.sic_description,
                ],
            )?;
            Ok(company.clone())
        }
        Some(mut stored) => {
            let before = stored.tickers.len();
            for ticker in &company.tickers {
                if !stored.tickers.contains(ticker) {
                    stored.tickers.push(ticker.clone());
                }
            }
            if stored.tickers.len() != before {
                conn.execute(
                    "UPDATE companies SET tickers = ?2, updated_at = datetime('now') WHERE cik = ?1",
                    params![stored.cik.as_str(), to_json(&stored.tickers)?],
                )?;
            }
            Ok(stored)
        }
    }
}

pub fn get_company(conn: &Connection, cik: &Cik) -> rusqlite::Result<Option<Company>> {
    conn.query_row(
        "SELECT cik, name, tickers, sic_code, sic_description FROM companies WHERE cik = ?1",
        params![cik.as_str()],
        |row| {
            let raw_cik: String = row.get(0)?;
            Ok(Company {
                cik: Cik::parse(&raw_cik).ok_or_else(|| conversion_error(0, "invalid cik"))?,
                name: row.get(1)?,
                tickers: from_json(row, 2)?,
                sic_code: row.get(3)?,
                sic_description: row.get(4)?,
            })
        },
    )
    .optional()
}

// ── Documents ──

/// Content-addressed insert. False when the content hash is already stored,
/// in which case nothing was written.
pub fn insert_document(conn: &Connection, run_id: Uuid, doc: &Document) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO documents (
            id, content_hash, run_id, cik, company_name, url, accession_number, filing_type,
            filing_date, period_of_report, fiscal_year, fetched_at, title, body_text, headings,
            word_count, char_count, reading_time_minutes, language, length_score,
            lang_confidence, density_score, structure_score, quality_score, has_tables,
            table_count, link_count, code_ratio, breadcrumbs, depth_in_site, http_status,
            content_type, tags)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                 ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31, ?32, ?33)
         ON CONFLICT(content_hash) DO NOTHING",
        params![
            doc.id.to_string(),
            doc.content_hash,
            run_id.to_string(),
            doc.cik.as_str(),
            doc.company_name,
            doc.url,
            doc.accession_number,
            doc.filing_type,
            doc.filing_date,
            doc.period_of_report,
            doc.fiscal_year,
            doc.fetched_at,
            doc.title,
            doc.body_text,
            to_json(&doc.headings)?,
            doc.word_count,
            doc.char_count,
            doc.reading_time_minutes,
            doc.language,
            doc.quality.length,
            doc.quality.lang_confidence,
            doc.quality.density,
            doc.quality.structure,
            doc.quality.score,
            doc.has_tables,
            doc.table_count,
            doc.link_count,
            doc.code_ratio,
            to_json(&doc.breadcrumbs)?,
            doc.depth_in_site,
            doc.http_status,
            doc.content_type,
            to_json(&doc.tags)?,
        ],
    )?;
    if inserted == 0 {
        return Ok(false);
    }

    let mut stmt = conn.prepare(
        "INSERT INTO sections
         (document_id, position, level, heading, body_text, word_count, char_count, item_tag)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for s in &doc.sections {
        stmt.execute(params![
            doc.id.to_string(),
            s.position,
            s.level,
            s.heading,
            s.body_text,
            s.word_count,
            s.char_count,
            s.item.map(|i| i.as_str()),
        ])?;
    }
    Ok(true)
}

const DOC_COLUMNS: &str = "id, content_hash, url, cik, company_name, accession_number, filing_type,
    filing_date, period_of_report, fiscal_year, fetched_at, title, body_text, headings,
    word_count, char_count, reading_time_minutes, language, length_score, lang_confidence,
    density_score, structure_score, quality_score, has_tables, table_count, link_count,
    code_ratio, breadcrumbs, depth_in_site, http_status, content_type, tags";

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    let raw_cik: String = row.get(3)?;
    Ok(Document {
        id: uuid_col(row, 0)?,
        content_hash: row.get(1)?,
        url: row.get(2)?,
        cik: Cik::parse(&raw_cik).ok_or_else(|| conversion_error(3, "invalid cik"))?,
        company_name: row.get(4)?,
        accession_number: row.get(5)?,
        filing_type: row.get(6)?,
        filing_date: row.get::<_, NaiveDate>(7)?,
        period_of_report: row.get(8)?,
        fiscal_year: row.get(9)?,
        fetched_at: row.get(10)?,
        title: row.get(11)?,
        body_text: row.get(12)?,
        headings: from_json(row, 13)?,
        sections: Vec::new(),
        word_count: row.get(14)?,
        char_count: row.get(15)?,
        reading_time_minutes: row.get(16)?,
        language: row.get(17)?,
        quality: QualityScore {
            length: row.get(18)?,
            lang_confidence: row.get(19)?,
            density: row.get(20)?,
            structure: row.get(21)?,
            score: row.get(22)?,
        },
        has_tables: row.get(23)?,
        table_count: row.get(24)?,
        link_count: row.get(25)?,
        code_ratio: row.get(26)?,
        breadcrumbs: from_json(row, 27)?,
        depth_in_site: row.get(28)?,
        http_status: row.get(29)?,
        content_type: row.get(30)?,
        tags: from_json(row, 31)?,
    })
}

fn load_sections(conn: &Connection, document_id: Uuid) -> rusqlite::Result<Vec<Section>> {
    let mut stmt = conn.prepare(
        "SELECT position, level, heading, body_text, word_count, char_count, item_tag
         FROM sections WHERE document_id = ?1 ORDER BY position",
    )?;
    let rows = stmt
        .query_map(params![document_id.to_string()], |row| {
            let item: Option<String> = row.get(6)?;
            Ok(Section {
                position: row.get(0)?,
                level: row.get(1)?,
                heading: row.get(2)?,
                body_text: row.get(3)?,
                word_count: row.get(4)?,
                char_count: row.get(5)?,
                item: item.as_deref().and_then(ItemTag::parse),
            })
        })?
        .collect::<Result<Vec<_>, _>>();
    rows
}

// ── Runs ──

const RUN_COLUMNS: &str = "run_id, started_at, finished_at, status, identifiers, filing_types,
    max_per_company, date_from, date_to, pages_crawled, pages_saved, pages_skipped,
    pages_errored, error_summary";

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<Run> {
    let status: String = row.get(3)?;
    Ok(Run {
        run_id: uuid_col(row, 0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        status: RunStatus::parse(&status).ok_or_else(|| conversion_error(3, "unknown run status"))?,
        scope: RunScope {
            identifiers: from_json(row, 4)?,
            filing_types: from_json(row, 5)?,
            max_per_company: row.get(6)?,
            date_from: row.get(7)?,
            date_to: row.get(8)?,
        },
        counters: RunCounters {
            pages_crawled: row.get(9)?,
            pages_saved: row.get(10)?,
            pages_skipped: row.get(11)?,
            pages_errored: row.get(12)?,
        },
        error_summary: row.get(13)?,
        errors: Vec::new(),
    })
}

// ── Stats ──

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub documents: u64,
    pub sections: u64,
    pub companies: u64,
    pub runs: u64,
    pub total_words: u64,
    pub avg_quality: Option<f64>,
    pub by_filing_type: Vec<(String, u64)>,
    pub by_language: Vec<(String, u64)>,
    pub by_item: Vec<(String, u64)>,
    pub errors_by_kind: Vec<(String, u64)>,
}

// ── Column helpers ──

fn to_json<T: Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn from_json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn conversion_error(idx: usize, message: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.to_string().into())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn company(tickers: &[&str]) -> Company {
        Company {
            cik: Cik::parse("320193").unwrap(),
            name: "Apple Inc.".into(),
            tickers: tickers.iter().map(|t| t.to_string()).collect(),
            sic_code: Some("3571".into()),
            sic_description: Some("Electronic Computers".into()),
        }
    }

    fn scope() -> RunScope {
        RunScope {
            identifiers: vec!["AAPL".into()],
            filing_types: vec!["10-K".into()],
            max_per_company: 3,
            date_from: NaiveDate::from_ymd_opt(2020, 1, 1),
            date_to: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap()
    }

    #[test]
    fn company_upsert_merges_tickers_and_keeps_name() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_company(&company(&["AAPL"])).unwrap();
        let mut renamed = company(&["AAPL", "APC"]);
        renamed.name = "Apple Computer".into();
        let stored = store.upsert_company(&renamed).unwrap();
        assert_eq!(stored.name, "Apple Inc.");
        assert_eq!(stored.tickers, vec!["AAPL", "APC"]);
        let read = store.get_company(&stored.cik).unwrap().unwrap();
        assert_eq!(read, stored);
    }

    #[test]
    fn run_lifecycle_and_error_log() {
        let store = Store::open_in_memory().unwrap();
        let run_id = Uuid::new_v4();
        store.create_run(run_id, &scope(), now()).unwrap();
        store.bump(run_id, Counter::Crawled).unwrap();
        store.bump(run_id, Counter::Errored).unwrap();

        let err = NewCrawlError {
            url: "https://www.sec.gov/x.htm",
            kind: "transport_failure",
            http_status: Some(404),
            message: "not found",
            occurred_at: now(),
        };
        assert_eq!(append_error(&store.conn(), run_id, &err).unwrap(), 1);
        assert_eq!(append_error(&store.conn(), run_id, &err).unwrap(), 2);

        store.finish_run(run_id, RunStatus::Failed, now(), Some("everything broke")).unwrap();
        assert!(store.finish_run(run_id, RunStatus::Completed, now(), None).is_err());

        let run = store.get_run(run_id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.scope, scope());
        assert_eq!(run.counters.pages_crawled, 1);
        assert_eq!(run.counters.pages_errored, 1);
        assert_eq!(run.errors.len(), 2);
        assert_eq!(run.errors[1].seq, 2);
        assert_eq!(run.errors[0].http_status, Some(404));
        assert_eq!(run.error_summary.as_deref(), Some("everything broke"));
        assert_eq!(store.list_runs(10).unwrap().len(), 1);
        assert!(store.get_run(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn file_backed_store_creates_directory() {
        let dir = std::env::temp_dir().join(format!("edgar_ingest_{}", Uuid::new_v4()));
        let path = dir.join("nested").join("edgar.sqlite");
        let store = Store::open(path.to_str().unwrap()).unwrap();
        assert_eq!(store.document_count().unwrap(), 0);
        drop(store);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
