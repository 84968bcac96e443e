use serde::{Deserialize, Serialize};

pub type VendorId = i64;
pub type ProductId = i64;
pub type VulnerabilityId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VendorUpsert {
    Inserted(VendorId),
    /// Name already present; only the product count was overwritten.
    Updated(VendorId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertOutcome {
    Inserted(i64),
    /// A uniqueness constraint rejected the row. Nothing was written.
    Duplicate,
}

impl InsertOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, InsertOutcome::Duplicate)
    }
}

/// A stored vulnerability whose detail page can be fetched for tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredVulnerability {
    pub id: VulnerabilityId,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityRef {
    pub name: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorTally {
    pub vendor: String,
    pub vulnerability_count: i64,
}
