use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_DB_PATH: &str = "data/edgar.sqlite";
const DEFAULT_DATA_URL: &str = "https://data.sec.gov";
const DEFAULT_ARCHIVES_URL: &str = "https://www.sec.gov/Archives/edgar/data";
const DEFAULT_TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";

/// Runtime configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub endpoints: Endpoints,
    pub fetch: FetchConfig,
    pub enrich: EnrichConfig,
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub data_url: String,
    pub archives_url: String,
    pub tickers_url: String,
}

impl Endpoints {
    pub fn submissions_url(&self, cik: &crate::model::Cik) -> String {
        format!("{}/submissions/CIK{}.json", self.data_url.trim_end_matches('/'), cik)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            data_url: DEFAULT_DATA_URL.to_string(),
            archives_url: DEFAULT_ARCHIVES_URL.to_string(),
            tickers_url: DEFAULT_TICKERS_URL.to_string(),
        }
    }
}

/// Global request budget plus transport settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub max_in_flight: usize,
    pub min_spacing: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "edgar_ingest/0.1 (admin@example.com)".to_string(),
            max_in_flight: 5,
            min_spacing: Duration::from_millis(150),
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Enrichment policy constants.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichConfig {
    pub weight_length: f64,
    pub weight_language: f64,
    pub weight_density: f64,
    pub weight_structure: f64,
    pub reading_wpm: f64,
    pub full_length_words: usize,
    pub full_structure_sections: usize,
}

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            weight_length: 0.30,
            weight_language: 0.25,
            weight_density: 0.25,
            weight_structure: 0.20,
            reading_wpm: 238.0,
            full_length_words: 500,
            full_structure_sections: 5,
        }
    }
}

impl EnrichConfig {
    /// Weights must be non-negative and sum to 1; the reading rate must be positive.
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("EDGAR_WEIGHT_LENGTH", self.weight_length),
            ("EDGAR_WEIGHT_LANGUAGE", self.weight_language),
            ("EDGAR_WEIGHT_DENSITY", self.weight_density),
            ("EDGAR_WEIGHT_STRUCTURE", self.weight_structure),
        ];
        for (name, w) in weights {
            anyhow::ensure!(w.is_finite() && w >= 0.0, "{name} must be a non-negative number, got {w}");
        }
        let sum: f64 = weights.iter().map(|(_, w)| w).sum();
        anyhow::ensure!(
            (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE,
            "EDGAR_WEIGHT_* must sum to 1.0, got {sum}"
        );
        anyhow::ensure!(self.reading_wpm > 0.0, "EDGAR_READING_WPM must be positive");
        Ok(())
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let user_agent = std::env::var("EDGAR_USER_AGENT")
            .context("EDGAR_USER_AGENT must be set (SEC requires a name and email)")?;

        let fetch_defaults = FetchConfig::default();
        let fetch = FetchConfig {
            user_agent,
            max_in_flight: env_or("EDGAR_MAX_CONCURRENT", fetch_defaults.max_in_flight)?,
            min_spacing: Duration::from_millis(env_or(
                "EDGAR_MIN_SPACING_MS",
                fetch_defaults.min_spacing.as_millis() as u64,
            )?),
            timeout: Duration::from_secs(env_or(
                "EDGAR_TIMEOUT_SECS",
                fetch_defaults.timeout.as_secs(),
            )?),
            max_retries: env_or("EDGAR_MAX_RETRIES", fetch_defaults.max_retries)?,
        };

        let endpoint_defaults = Endpoints::default();
        let endpoints = Endpoints {
            data_url: env_or("EDGAR_DATA_URL", endpoint_defaults.data_url)?,
            archives_url: env_or("EDGAR_ARCHIVES_URL", endpoint_defaults.archives_url)?,
            tickers_url: env_or("EDGAR_TICKERS_URL", endpoint_defaults.tickers_url)?,
        };

        let d = EnrichConfig::default();
        let enrich = EnrichConfig {
            weight_length: env_or("EDGAR_WEIGHT_LENGTH", d.weight_length)?,
            weight_language: env_or("EDGAR_WEIGHT_LANGUAGE", d.weight_language)?,
            weight_density: env_or("EDGAR_WEIGHT_DENSITY", d.weight_density)?,
            weight_structure: env_or("EDGAR_WEIGHT_STRUCTURE", d.weight_structure)?,
            reading_wpm: env_or("EDGAR_READING_WPM", d.reading_wpm)?,
            ..d
        };
        enrich.validate()?;
        anyhow::ensure!(fetch.max_in_flight > 0, "EDGAR_MAX_CONCURRENT must be at least 1");

        Ok(Self {
            db_path: db_path(),
            endpoints,
            fetch,
            enrich,
        })
    }
}

/// Database location alone, for commands that never touch the network.
pub fn db_path() -> String {
    let _ = dotenvy::dotenv();
    std::env::var("EDGAR_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string())
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {}={:?}: {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}
