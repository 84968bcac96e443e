//! Core utilities and shared types for the threat catalog crawler.

pub mod error;

use serde::{Deserialize, Serialize};
use std::fmt;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// The three paginated listings of the catalog. Crawl order is the declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Vendor,
    Product,
    Vulnerability,
}

impl CatalogKind {
    pub const CRAWL_ORDER: [CatalogKind; 3] =
        [CatalogKind::Vendor, CatalogKind::Product, CatalogKind::Vulnerability];

    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Vendor => "vendor",
            CatalogKind::Product => "product",
            CatalogKind::Vulnerability => "vulnerability",
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Placeholder foreign key for a product that could not be resolved by name.
pub const UNRESOLVED_ID: i64 = 0;

/// Marker stored when a listing row carries no link or no product column.
pub const NOT_AVAILABLE: &str = "N/A";

/// Listing URL for a 1-based page number. Page 1 is the bare base URL.
pub fn paged_url(base: &str, page: u32) -> String {
    if page > 1 {
        format!("{}?paged={}", base, page)
    } else {
        base.to_string()
    }
}
