//! Tag enrichment: one detail-page fetch per stored vulnerability, at most
//! `tag_concurrency` in flight. A failed task is logged and counted; it never
//! cancels its siblings.

use crate::pipeline::{lock, Crawler};
use crate::report::TagReport;
use crate::source::PageSource;
use anyhow::Result;
use catalog_sqlite::{InsertOutcome, SharedDb, StoredVulnerability};
use std::sync::Arc;
use threatdb_core::error::CrawlError;
use threatdb_core::NOT_AVAILABLE;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use url::Url;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Collected {
    inserted: u64,
    duplicates: u64,
}

impl Crawler {
    pub async fn enrich_tags(&self) -> Result<TagReport> {
        let stored = lock(&self.db)?.stored_vulnerabilities()?;
        let base = Url::parse(&self.opts.vulnerability_url)?;
        info!(count = stored.len(), concurrency = self.opts.tag_concurrency, "collecting vulnerability tags");

        let mut report = TagReport { vulnerabilities: stored.len() as u64, ..TagReport::default() };
        let sem = Arc::new(Semaphore::new(self.opts.tag_concurrency.max(1)));
        let mut handles = Vec::with_capacity(stored.len());
        for vuln in stored {
            if vuln.link == NOT_AVAILABLE || vuln.link.is_empty() {
                warn!(vulnerability_id = vuln.id, "no detail link, skipping tags");
                report.skipped += 1;
                continue;
            }
            let permit = sem.clone().acquire_owned().await?;
            let source = self.source.clone();
            let db = self.db.clone();
            let base = base.clone();
            handles.push(tokio::spawn(async move {
                let res = collect_tags(source.as_ref(), &db, &base, &vuln).await;
                drop(permit);
                (vuln.id, res)
            }));
        }

        for h in handles {
            match h.await {
                Ok((_, Ok(c))) => {
                    report.fetched += 1;
                    report.tags_inserted += c.inserted;
                    report.duplicates += c.duplicates;
                }
                Ok((id, Err(e))) => {
                    if e.downcast_ref::<CrawlError>().is_some_and(CrawlError::is_fetch) {
                        warn!(vulnerability_id = id, error = %e, "detail page unreachable");
                        report.unreachable += 1;
                    } else {
                        error!(vulnerability_id = id, error = %e, "tag collection failed");
                    }
                    report.failed += 1;
                }
                Err(e) => {
                    error!(error = %e, "tag task aborted");
                    report.failed += 1;
                }
            }
        }
        info!(
            fetched = report.fetched,
            failed = report.failed,
            tags = report.tags_inserted,
            "tag collection complete"
        );
        Ok(report)
    }
}

async fn collect_tags(
    source: &dyn PageSource,
    db: &SharedDb,
    base: &Url,
    vuln: &StoredVulnerability,
) -> Result<Collected> {
    let url = base.join(&vuln.link)?;
    let page = source.fetch(url.as_str()).await?;
    if !page.is_success() {
        return Err(CrawlError::FetchStatus { url: url.to_string(), status: page.status }.into());
    }
    let tags = page_extract::extract_tags(&page.body);
    let db = lock(db)?;
    let mut out = Collected::default();
    for tag in tags {
        match db.insert_tag(&tag, vuln.id)? {
            InsertOutcome::Inserted(_) => out.inserted += 1,
            InsertOutcome::Duplicate => {
                debug!(%tag, vulnerability_id = vuln.id, "tag already exists for vulnerability");
                out.duplicates += 1;
            }
        }
    }
    Ok(out)
}
