use crate::CatalogKind;
use thiserror::Error;

/// Anticipated failures of a crawl. None of them stops a run on its own;
/// callers log them and move on to the next page, row or task.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CrawlError {
    #[error("{url} answered with status {status}")]
    FetchStatus { url: String, status: u16 },
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{kind} row is missing its {field}")]
    MissingField { kind: CatalogKind, field: &'static str },
    #[error("{kind} row has a non-numeric {field}: {value:?}")]
    BadNumber { kind: CatalogKind, field: &'static str, value: String },
    #[error("vendor {name:?} is not in the catalog")]
    UnresolvedVendor { name: String },
}

impl CrawlError {
    /// Fetch-level failures, as opposed to problems with a single row.
    pub fn is_fetch(&self) -> bool {
        matches!(self, CrawlError::FetchStatus { .. } | CrawlError::Transport { .. })
    }
}
