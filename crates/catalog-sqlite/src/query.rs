//! Natural-key lookups. Matching is exact: names scraped in one phase are the
//! keys of the next, so no trimming or case folding happens here.

use crate::{Db, ProductId, StoredVulnerability, VendorId, VulnerabilityId};
use anyhow::{bail, Result};
use rusqlite::OptionalExtension;

impl Db {
    pub fn find_vendor_id_by_name(&self, name: &str) -> Result<Option<VendorId>> {
        Ok(self
            .conn
            .query_row("SELECT id FROM vendors WHERE name=?", [name], |r| r.get(0))
            .optional()?)
    }

    /// Product names are not unique on their own; the earliest row wins.
    pub fn find_product_id_by_name(&self, name: &str) -> Result<Option<ProductId>> {
        Ok(self
            .conn
            .query_row("SELECT id FROM products WHERE name=? ORDER BY id LIMIT 1", [name], |r| r.get(0))
            .optional()?)
    }

    pub fn find_vulnerability_id_by_link(&self, link: &str) -> Result<Option<VulnerabilityId>> {
        Ok(self
            .conn
            .query_row("SELECT id FROM vulnerabilities WHERE link=?", [link], |r| r.get(0))
            .optional()?)
    }

    pub fn stored_vulnerabilities(&self) -> Result<Vec<StoredVulnerability>> {
        let mut stmt = self.conn.prepare("SELECT id, link FROM vulnerabilities ORDER BY id")?;
        let rows = stmt.query_map([], |r| Ok(StoredVulnerability { id: r.get(0)?, link: r.get(1)? }))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn tags_for(&self, vulnerability_id: VulnerabilityId) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT tag FROM tags WHERE vulnerability_id=? ORDER BY id")?;
        let rows = stmt.query_map([vulnerability_id], |r| r.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let cnt: i64 = self.conn.query_row(
            "SELECT COUNT(1) FROM sqlite_master WHERE type='table' AND name=?",
            [name],
            |r| r.get(0),
        )?;
        Ok(cnt > 0)
    }

    pub fn count_rows(&self, table: &str) -> Result<i64> {
        if !crate::schema::CATALOG_TABLES.contains(&table) {
            bail!("not a catalog table: {table}");
        }
        let sql = format!("SELECT COUNT(1) FROM {}", table);
        Ok(self.conn.query_row(&sql, [], |r| r.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_exact_match() {
        let db = Db::open_in_memory().unwrap();
        db.upsert_vendor("Acme", 1, "/v/acme").unwrap();
        assert!(db.find_vendor_id_by_name("Acme").unwrap().is_some());
        assert!(db.find_vendor_id_by_name("acme").unwrap().is_none());
        assert!(db.find_vendor_id_by_name("Acme ").unwrap().is_none());
    }

    #[test]
    fn product_lookup_prefers_first_row() {
        let db = Db::open_in_memory().unwrap();
        let first = db.insert_product("Suite", 1, 1, "/p/a").unwrap();
        db.insert_product("Suite", 1, 1, "/p/b").unwrap();
        assert_eq!(crate::InsertOutcome::Inserted(db.find_product_id_by_name("Suite").unwrap().unwrap()), first);
        assert_eq!(db.find_product_id_by_name("Missing").unwrap(), None);
    }

    #[test]
    fn vulnerability_lookup_by_link() {
        let db = Db::open_in_memory().unwrap();
        db.insert_vulnerability("CVE-X", None, "/v/1", 0).unwrap();
        assert!(db.find_vulnerability_id_by_link("/v/1").unwrap().is_some());
        assert!(db.find_vulnerability_id_by_link("/v/2").unwrap().is_none());
        let stored = db.stored_vulnerabilities().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].link, "/v/1");
    }

    #[test]
    fn count_rows_rejects_unknown_tables() {
        let db = Db::open_in_memory().unwrap();
        assert!(db.count_rows("sqlite_master; DROP TABLE tags").is_err());
    }
}
