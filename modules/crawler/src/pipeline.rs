//! Sequential listing crawl: vendors, then products, then vulnerabilities.
//! Each phase resolves its foreign keys by name against rows written by the
//! phase before it, so the order is fixed.

use crate::report::{PhaseEnd, PhaseReport, PipelineReport};
use crate::source::PageSource;
use anyhow::{anyhow, Result};
use catalog_sqlite::{Db, InsertOutcome, SharedDb, VendorUpsert};
use page_extract::{ProductRow, VendorRow, VulnerabilityRow};
use std::sync::{Arc, MutexGuard};
use std::time::Duration;
use threatdb_core::error::CrawlError;
use threatdb_core::{paged_url, CatalogKind};
use tracing::{debug, error, info, warn};

pub const DEFAULT_VENDOR_URL: &str = "https://threats.kaspersky.com/en/vendor/";
pub const DEFAULT_PRODUCT_URL: &str = "https://threats.kaspersky.com/en/product/";
pub const DEFAULT_VULNERABILITY_URL: &str = "https://threats.kaspersky.com/en/vulnerability/";

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub vendor_url: String,
    pub product_url: String,
    pub vulnerability_url: String,
    /// Pause after every listing page.
    pub delay: Duration,
    pub tag_concurrency: usize,
    /// Upper bound on pages per listing. `None` follows pagination to its end.
    pub max_pages: Option<u32>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        CrawlOptions {
            vendor_url: DEFAULT_VENDOR_URL.to_string(),
            product_url: DEFAULT_PRODUCT_URL.to_string(),
            vulnerability_url: DEFAULT_VULNERABILITY_URL.to_string(),
            delay: Duration::from_secs(1),
            tag_concurrency: 10,
            max_pages: None,
        }
    }
}

impl CrawlOptions {
    pub fn listing_url(&self, kind: CatalogKind) -> &str {
        match kind {
            CatalogKind::Vendor => &self.vendor_url,
            CatalogKind::Product => &self.product_url,
            CatalogKind::Vulnerability => &self.vulnerability_url,
        }
    }
}

/// Which parts of the pipeline to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stages {
    pub listings: bool,
    pub tags: bool,
}

impl Default for Stages {
    fn default() -> Self {
        Stages { listings: true, tags: true }
    }
}

pub struct Crawler {
    pub(crate) source: Arc<dyn PageSource>,
    pub(crate) db: SharedDb,
    pub(crate) opts: CrawlOptions,
}

pub(crate) fn lock(db: &SharedDb) -> Result<MutexGuard<'_, Db>> {
    db.lock().map_err(|_| anyhow!("catalog database lock poisoned"))
}

impl Crawler {
    pub fn new(source: Arc<dyn PageSource>, db: SharedDb, opts: CrawlOptions) -> Self {
        Crawler { source, db, opts }
    }

    pub fn db(&self) -> &SharedDb {
        &self.db
    }

    pub async fn run(&self, stages: Stages) -> Result<PipelineReport> {
        let mut report = PipelineReport::default();
        if stages.listings {
            report.phases.push(self.crawl_vendors().await?);
            report.phases.push(self.crawl_products().await?);
            report.phases.push(self.crawl_vulnerabilities().await?);
            info!("finished listing crawl");
        }
        if stages.tags {
            report.tags = Some(self.enrich_tags().await?);
        }
        Ok(report)
    }

    pub async fn crawl_vendors(&self) -> Result<PhaseReport> {
        self.crawl_listing(CatalogKind::Vendor, page_extract::extract_vendors, store_vendor).await
    }

    pub async fn crawl_products(&self) -> Result<PhaseReport> {
        self.crawl_listing(CatalogKind::Product, page_extract::extract_products, store_product).await
    }

    pub async fn crawl_vulnerabilities(&self) -> Result<PhaseReport> {
        self.crawl_listing(CatalogKind::Vulnerability, page_extract::extract_vulnerabilities, store_vulnerability)
            .await
    }

    async fn crawl_listing<T>(
        &self,
        kind: CatalogKind,
        extract: fn(&str) -> page_extract::Extraction<T>,
        store: fn(&Db, T, &mut PhaseReport) -> Result<()>,
    ) -> Result<PhaseReport> {
        let base = self.opts.listing_url(kind);
        let mut report = PhaseReport::new(kind);
        let mut page: u32 = 1;
        loop {
            if self.opts.max_pages.is_some_and(|max| page > max) {
                info!(%kind, page, "page limit reached");
                report.end = PhaseEnd::PageLimit;
                break;
            }
            let url = paged_url(base, page);
            info!(%kind, page, %url, "parsing listing page");
            let fetched = match self.source.fetch(&url).await {
                Ok(f) => f,
                Err(e) => {
                    error!(%kind, page, %url, error = %e, "listing fetch failed, ending phase");
                    report.end = PhaseEnd::Transport { message: e.to_string() };
                    break;
                }
            };
            if !fetched.is_success() {
                let err = CrawlError::FetchStatus { url: url.clone(), status: fetched.status };
                warn!(%kind, page, error = %err, "ending phase");
                report.end = PhaseEnd::Status { status: fetched.status };
                break;
            }
            report.pages += 1;

            let extraction = extract(&fetched.body);
            if extraction.is_exhausted() {
                info!(%kind, page, "page has no data rows, ending phase");
                report.end = PhaseEnd::Exhausted;
                break;
            }
            for issue in &extraction.issues {
                warn!(%kind, page, row = issue.index, error = %issue.error, "skipping malformed row");
            }
            report.issues += extraction.issues.len() as u64;
            report.decoration += extraction.decoration as u64;
            {
                let db = lock(&self.db)?;
                for row in extraction.rows {
                    store(&db, row, &mut report)?;
                }
            }

            page += 1;
            if !self.opts.delay.is_zero() {
                tokio::time::sleep(self.opts.delay).await;
            }
        }
        if report.end.is_alert() {
            warn!(%kind, pages = report.pages, end = ?report.end, "phase ended on a failure, later pages may be missing");
        }
        info!(
            %kind,
            pages = report.pages,
            inserted = report.inserted,
            updated = report.updated,
            duplicates = report.duplicates,
            skipped = report.skipped,
            "phase complete"
        );
        Ok(report)
    }
}

fn store_vendor(db: &Db, row: VendorRow, report: &mut PhaseReport) -> Result<()> {
    match db.upsert_vendor(&row.name, row.count_products, &row.link)? {
        VendorUpsert::Inserted(id) => {
            debug!(id, name = %row.name, "vendor added");
            report.inserted += 1;
        }
        VendorUpsert::Updated(id) => {
            debug!(id, name = %row.name, count = row.count_products, "vendor count updated");
            report.updated += 1;
        }
    }
    Ok(())
}

fn store_product(db: &Db, row: ProductRow, report: &mut PhaseReport) -> Result<()> {
    let Some(vendor_id) = db.find_vendor_id_by_name(&row.vendor_name)? else {
        let err = CrawlError::UnresolvedVendor { name: row.vendor_name };
        warn!(product = %row.name, error = %err, "skipping product");
        report.skipped += 1;
        return Ok(());
    };
    match db.insert_product(&row.name, vendor_id, row.value, &row.link)? {
        InsertOutcome::Inserted(id) => {
            debug!(id, name = %row.name, vendor_id, "product added");
            report.inserted += 1;
        }
        InsertOutcome::Duplicate => {
            info!(name = %row.name, link = %row.link, "product already exists with the same link");
            report.duplicates += 1;
        }
    }
    Ok(())
}

fn store_vulnerability(db: &Db, row: VulnerabilityRow, report: &mut PhaseReport) -> Result<()> {
    let product_id = db.find_product_id_by_name(&row.product_name)?;
    if product_id.is_none() {
        warn!(vulnerability = %row.name, product = %row.product_name, "product not found, storing unresolved reference");
        report.unresolved += 1;
    }
    match db.insert_vulnerability(&row.name, product_id, &row.link, 0)? {
        InsertOutcome::Inserted(id) => {
            debug!(id, name = %row.name, ?product_id, "vulnerability added");
            report.inserted += 1;
        }
        InsertOutcome::Duplicate => {
            info!(name = %row.name, link = %row.link, "vulnerability already exists with the same link");
            report.duplicates += 1;
        }
    }
    Ok(())
}
