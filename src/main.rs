use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::warn;
use uuid::Uuid;

use edgar_ingest::config::{self, Config};
use edgar_ingest::db::Store;
use edgar_ingest::fetch::HttpTransport;
use edgar_ingest::model::{Run, RunScope};
use edgar_ingest::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "edgar_ingest", about = "SEC EDGAR filing ingest")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, fetch, extract, enrich and store filings for some companies
    Run {
        /// CIKs or tickers (comma separated or repeated)
        #[arg(short, long = "ids", required = true, num_args = 1.., value_delimiter = ',')]
        ids: Vec<String>,
        /// Form types to keep (empty keeps every form)
        #[arg(short, long, value_delimiter = ',', default_value = "10-K")]
        forms: Vec<String>,
        /// Max filings per company, newest first
        #[arg(short = 'n', long, default_value = "5")]
        max: usize,
        /// Earliest filing date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Latest filing date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Recent runs
    Runs {
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// One run with its crawl errors
    ShowRun { run_id: Uuid },
    /// Corpus statistics
    Stats,
    /// Stored documents as JSON lines
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Only this form type
        #[arg(short = 't', long)]
        filing_type: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { ids, forms, max, from, to } => {
            let cfg = Config::from_env()?;
            let store = Store::open(&cfg.db_path)?;
            let transport = Arc::new(HttpTransport::new(&cfg.fetch)?);
            let pipeline = Pipeline::new(store, transport, cfg).with_progress_bar(true);

            let scope = RunScope {
                identifiers: ids,
                filing_types: forms.into_iter().filter(|f| !f.trim().is_empty()).collect(),
                max_per_company: max,
                date_from: from,
                date_to: to,
            };
            println!(
                "Ingesting {} companies (forms: {}, max {} each)...",
                scope.identifiers.len(),
                if scope.filing_types.is_empty() { "all".to_string() } else { scope.filing_types.join(",") },
                scope.max_per_company
            );

            let handle = pipeline.start_run(scope)?;
            let token = handle.cancel_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted, letting in-flight fetches finish");
                    token.cancel();
                }
            });
            let run = handle.wait().await?;
            print_run(&run);
            Ok(())
        }
        Commands::Runs { limit } => {
            let store = Store::open(&config::db_path())?;
            let runs = store.list_runs(limit)?;
            if runs.is_empty() {
                println!("No runs yet. Start one with 'run --ids <CIK|TICKER>'.");
                return Ok(());
            }
            println!(
                "{:<36} | {:<9} | {:<19} | {:>7} | {:>5} | {:>7} | {:>6} | {:<24}",
                "Run", "Status", "Started", "Crawled", "Saved", "Skipped", "Errors", "Companies"
            );
            println!("{}", "-".repeat(133));
            for r in &runs {
                println!(
                    "{:<36} | {:<9} | {:<19} | {:>7} | {:>5} | {:>7} | {:>6} | {:<24}",
                    r.run_id,
                    r.status.as_str(),
                    r.started_at.format("%Y-%m-%d %H:%M:%S"),
                    r.counters.pages_crawled,
                    r.counters.pages_saved,
                    r.counters.pages_skipped,
                    r.counters.pages_errored,
                    truncate(&r.scope.identifiers.join(","), 24),
                );
            }
            Ok(())
        }
        Commands::ShowRun { run_id } => {
            let store = Store::open(&config::db_path())?;
            let run = store
                .get_run(run_id)?
                .with_context(|| format!("no run {run_id}"))?;
            print_run(&run);
            if !run.errors.is_empty() {
                println!("\n--- Errors ---");
                for e in &run.errors {
                    let status = e.http_status.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
                    println!(
                        "{:>4} | {:<18} | {:>4} | {} | {}",
                        e.seq,
                        e.kind,
                        status,
                        truncate(&e.url, 60),
                        truncate(&e.message, 80)
                    );
                }
            }
            Ok(())
        }
        Commands::Stats => {
            let store = Store::open(&config::db_path())?;
            let s = store.stats()?;
            println!("Documents:   {}", s.documents);
            println!("Sections:    {}", s.sections);
            println!("Companies:   {}", s.companies);
            println!("Runs:        {}", s.runs);
            println!("Words:       {}", s.total_words);
            match s.avg_quality {
                Some(q) => println!("Avg quality: {:.3}", q),
                None => println!("Avg quality: -"),
            }
            print_counts("By filing type", &s.by_filing_type);
            print_counts("By language", &s.by_language);
            print_counts("By item", &s.by_item);
            print_counts("Errors by kind", &s.errors_by_kind);
            Ok(())
        }
        Commands::Export { out, filing_type } => {
            let store = Store::open(&config::db_path())?;
            let written = match &out {
                Some(path) => {
                    let file = File::create(path)
                        .with_context(|| format!("creating {}", path.display()))?;
                    let mut w = BufWriter::new(file);
                    let n = store.export_documents(&mut w, filing_type.as_deref())?;
                    w.flush()?;
                    n
                }
                None => store.export_documents(io::stdout().lock(), filing_type.as_deref())?,
            };
            if let Some(path) = &out {
                println!("Exported {} documents to {}", written, path.display());
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_run(run: &Run) {
    println!("Run {} [{}]", run.run_id, run.status.as_str());
    println!(
        "  {} crawled, {} saved, {} skipped, {} errors",
        run.counters.pages_crawled,
        run.counters.pages_saved,
        run.counters.pages_skipped,
        run.counters.pages_errored
    );
    if let Some(summary) = &run.error_summary {
        println!("  {}", summary);
    }
}

fn print_counts(title: &str, rows: &[(String, u64)]) {
    if rows.is_empty() {
        return;
    }
    println!("\n--- {} ---", title);
    for (key, n) in rows {
        println!("  {:<28} {:>7}", truncate(key, 28), n);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
