//! EDGAR filing ingest: discover filings per company, fetch their primary
//! documents, extract and enrich the text, and store each distinct document
//! once.

pub mod config;
pub mod db;
pub mod discovery;
pub mod enrich;
pub mod error;
pub mod fetch;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod writer;
