use serde::Serialize;
use threatdb_core::CatalogKind;

/// Why a listing phase stopped paginating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PhaseEnd {
    /// A page came back fine but held no data rows.
    Exhausted,
    /// The server answered a page with a non-success status.
    Status { status: u16 },
    /// The request itself failed.
    Transport { message: String },
    PageLimit,
}

impl PhaseEnd {
    /// Ends that may hide unvisited pages.
    pub fn is_alert(&self) -> bool {
        matches!(self, PhaseEnd::Transport { .. } | PhaseEnd::Status { status: 500..=599 })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub kind: CatalogKind,
    pub pages: u32,
    pub inserted: u64,
    pub updated: u64,
    pub duplicates: u64,
    /// Rows dropped because a required reference did not resolve.
    pub skipped: u64,
    /// Rows stored with the unresolved sentinel.
    pub unresolved: u64,
    /// Malformed rows reported by extraction.
    pub issues: u64,
    /// Header, cover and title-less rows passed over.
    pub decoration: u64,
    pub end: PhaseEnd,
}

impl PhaseReport {
    pub fn new(kind: CatalogKind) -> Self {
        PhaseReport {
            kind,
            pages: 0,
            inserted: 0,
            updated: 0,
            duplicates: 0,
            skipped: 0,
            unresolved: 0,
            issues: 0,
            decoration: 0,
            end: PhaseEnd::Exhausted,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagReport {
    pub vulnerabilities: u64,
    pub fetched: u64,
    pub failed: u64,
    /// Failures where the detail page could not be fetched at all. Counted in `failed` too.
    pub unreachable: u64,
    /// Vulnerabilities without a fetchable link.
    pub skipped: u64,
    pub tags_inserted: u64,
    pub duplicates: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub phases: Vec<PhaseReport>,
    pub tags: Option<TagReport>,
}

impl PipelineReport {
    pub fn phase(&self, kind: CatalogKind) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.kind == kind)
    }
}
