use crate::{Db, InsertOutcome, ProductId, VendorId, VendorUpsert, VulnerabilityId};
use anyhow::Result;
use rusqlite::{params, ErrorCode};
use threatdb_core::UNRESOLVED_ID;

impl Db {
    pub fn upsert_vendor(&self, name: &str, count_products: i64, link: &str) -> Result<VendorUpsert> {
        if let Some(id) = self.find_vendor_id_by_name(name)? {
            self.conn.execute(
                "UPDATE vendors SET count_products=? WHERE id=?",
                params![count_products, id],
            )?;
            return Ok(VendorUpsert::Updated(id));
        }
        self.conn.execute(
            "INSERT INTO vendors(name,count_products,link) VALUES (?,?,?)",
            params![name, count_products, link],
        )?;
        Ok(VendorUpsert::Inserted(self.conn.last_insert_rowid()))
    }

    pub fn insert_product(&self, name: &str, vendor_id: VendorId, value: i64, link: &str) -> Result<InsertOutcome> {
        let res = self.conn.execute(
            "INSERT INTO products(name,vendor_id,value,link) VALUES (?,?,?,?)",
            params![name, vendor_id, value, link],
        );
        self.outcome(res)
    }

    /// `product_id` of `None` is stored as the unresolved sentinel.
    pub fn insert_vulnerability(
        &self,
        name: &str,
        product_id: Option<ProductId>,
        link: &str,
        article_id: i64,
    ) -> Result<InsertOutcome> {
        let res = self.conn.execute(
            "INSERT INTO vulnerabilities(name,product_id,link,article_id) VALUES (?,?,?,?)",
            params![name, product_id.unwrap_or(UNRESOLVED_ID), link, article_id],
        );
        self.outcome(res)
    }

    pub fn insert_tag(&self, tag: &str, vulnerability_id: VulnerabilityId) -> Result<InsertOutcome> {
        let res = self.conn.execute(
            "INSERT INTO tags(tag,vulnerability_id) VALUES (?,?)",
            params![tag, vulnerability_id],
        );
        self.outcome(res)
    }

    fn outcome(&self, res: rusqlite::Result<usize>) -> Result<InsertOutcome> {
        match res {
            Ok(_) => Ok(InsertOutcome::Inserted(self.conn.last_insert_rowid())),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => {
            err.code == ErrorCode::ConstraintViolation
                && (err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_upsert_updates_count_only() {
        let db = Db::open_in_memory().unwrap();
        let first = db.upsert_vendor("Acme", 3, "/vendor/acme").unwrap();
        let VendorUpsert::Inserted(id) = first else { panic!("expected insert, got {first:?}") };
        assert_eq!(db.upsert_vendor("Acme", 5, "/vendor/other").unwrap(), VendorUpsert::Updated(id));
        assert_eq!(db.count_rows("vendors").unwrap(), 1);
        let (count, link): (i64, String) = db
            .conn
            .query_row("SELECT count_products, link FROM vendors WHERE id=?", [id], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap();
        assert_eq!(count, 5);
        assert_eq!(link, "/vendor/acme");
    }

    #[test]
    fn duplicate_product_is_a_noop() {
        let db = Db::open_in_memory().unwrap();
        let VendorUpsert::Inserted(vid) = db.upsert_vendor("Acme", 1, "/v/acme").unwrap() else { panic!() };
        assert!(matches!(db.insert_product("Acme Suite", vid, 7, "/p/suite").unwrap(), InsertOutcome::Inserted(_)));
        assert!(db.insert_product("Acme Suite", vid, 9, "/p/suite").unwrap().is_duplicate());
        assert_eq!(db.count_rows("products").unwrap(), 1);
    }

    #[test]
    fn same_product_name_under_another_link_is_kept() {
        let db = Db::open_in_memory().unwrap();
        db.insert_product("Suite", 1, 1, "/p/a").unwrap();
        db.insert_product("Suite", 1, 1, "/p/b").unwrap();
        assert_eq!(db.count_rows("products").unwrap(), 2);
    }

    #[test]
    fn unresolved_product_stores_sentinel() {
        let db = Db::open_in_memory().unwrap();
        let InsertOutcome::Inserted(id) = db.insert_vulnerability("CVE-X", None, "/v/1", 0).unwrap() else { panic!() };
        let product_id: i64 = db
            .conn
            .query_row("SELECT product_id FROM vulnerabilities WHERE id=?", [id], |r| r.get(0))
            .unwrap();
        assert_eq!(product_id, UNRESOLVED_ID);
    }

    #[test]
    fn duplicate_vulnerability_link_is_a_noop() {
        let db = Db::open_in_memory().unwrap();
        db.insert_vulnerability("CVE-X", Some(1), "/v/1", 0).unwrap();
        assert!(db.insert_vulnerability("CVE-X again", Some(2), "/v/1", 0).unwrap().is_duplicate());
        assert_eq!(db.count_rows("vulnerabilities").unwrap(), 1);
    }

    #[test]
    fn duplicate_tag_is_soft() {
        let db = Db::open_in_memory().unwrap();
        db.insert_tag("RCE", 1).unwrap();
        assert!(db.insert_tag("RCE", 1).unwrap().is_duplicate());
        assert!(!db.insert_tag("RCE", 2).unwrap().is_duplicate());
        assert_eq!(db.count_rows("tags").unwrap(), 2);
    }
}
