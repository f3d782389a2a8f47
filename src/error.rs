use thiserror::Error;

/// Per-filing failure taxonomy. Every failure inside a run is classified into
/// one of these and recorded on the run; none of them abort the run.
#[derive(Debug, Error)]
pub enum FilingError {
    #[error("discovery failed for {identifier}: {message}")]
    Discovery { identifier: String, message: String },

    #[error("transport failed{}: {message}", status_suffix(.status))]
    Transport { status: Option<u16>, message: String },

    #[error("no content candidate reached {min_chars} chars (best {best_chars})")]
    NotExtractable { best_chars: usize, min_chars: usize },

    #[error("enrichment failed: {0}")]
    Enrichment(String),

    #[error("content hash {content_hash} already stored")]
    WriteConflict { content_hash: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DiscoveryFailure,
    TransportFailure,
    NotExtractable,
    EnrichmentFailure,
    WriteConflict,
    StorageFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DiscoveryFailure => "discovery_failure",
            ErrorKind::TransportFailure => "transport_failure",
            ErrorKind::NotExtractable => "not_extractable",
            ErrorKind::EnrichmentFailure => "enrichment_failure",
            ErrorKind::WriteConflict => "write_conflict",
            ErrorKind::StorageFailure => "storage_failure",
        }
    }
}

impl FilingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FilingError::Discovery { .. } => ErrorKind::DiscoveryFailure,
            FilingError::Transport { .. } => ErrorKind::TransportFailure,
            FilingError::NotExtractable { .. } => ErrorKind::NotExtractable,
            FilingError::Enrichment(_) => ErrorKind::EnrichmentFailure,
            FilingError::WriteConflict { .. } => ErrorKind::WriteConflict,
            FilingError::Storage(_) => ErrorKind::StorageFailure,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            FilingError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Thin pages and duplicate content are expected; they count as skips.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            FilingError::NotExtractable { .. } | FilingError::WriteConflict { .. }
        )
    }

    /// Whether this failure is appended to the run's crawl-error log.
    pub fn is_logged(&self) -> bool {
        !matches!(self, FilingError::WriteConflict { .. })
    }
}
