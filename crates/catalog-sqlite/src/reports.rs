//! Read-only report queries. The free functions open an existing database file
//! read-only for the duration of one call and close it on return.

use crate::{Db, VendorTally, VulnerabilityRef};
use anyhow::Result;
use rusqlite::params;
use std::path::Path;

impl Db {
    pub fn vulnerabilities_for_product(&self, product_name: &str) -> Result<Vec<VulnerabilityRef>> {
        let mut stmt = self.conn.prepare(
            "SELECT v.name, v.link
             FROM vulnerabilities v
             JOIN products p ON v.product_id = p.id
             WHERE p.name = ?
             ORDER BY v.id",
        )?;
        let rows = stmt.query_map([product_name], |r| Ok(VulnerabilityRef { name: r.get(0)?, link: r.get(1)? }))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Vendors ranked by how many of their vulnerabilities carry `tag`.
    pub fn top_vendors_for_tag(&self, tag: &str, limit: usize) -> Result<Vec<VendorTally>> {
        let mut stmt = self.conn.prepare(
            "SELECT v.name, COUNT(DISTINCT vuln.id) AS vulnerability_count
             FROM vendors v
             JOIN products p ON v.id = p.vendor_id
             JOIN vulnerabilities vuln ON p.id = vuln.product_id
             JOIN tags t ON vuln.id = t.vulnerability_id
             WHERE t.tag = ?
             GROUP BY v.id
             ORDER BY vulnerability_count DESC, v.name ASC
             LIMIT ?",
        )?;
        let rows = stmt.query_map(params![tag, limit as i64], |r| {
            Ok(VendorTally { vendor: r.get(0)?, vulnerability_count: r.get(1)? })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

pub fn vulnerabilities_for_product(db_path: impl AsRef<Path>, product_name: &str) -> Result<Vec<VulnerabilityRef>> {
    Db::open_read_only(db_path)?.vulnerabilities_for_product(product_name)
}

pub fn top_vendors_for_tag(db_path: impl AsRef<Path>, tag: &str, limit: usize) -> Result<Vec<VendorTally>> {
    Db::open_read_only(db_path)?.top_vendors_for_tag(tag, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InsertOutcome, VendorUpsert};

    fn vendor(db: &Db, name: &str) -> i64 {
        match db.upsert_vendor(name, 1, &format!("/vendor/{name}")).unwrap() {
            VendorUpsert::Inserted(id) | VendorUpsert::Updated(id) => id,
        }
    }

    fn product(db: &Db, name: &str, vendor_id: i64) -> i64 {
        let InsertOutcome::Inserted(id) = db.insert_product(name, vendor_id, 1, &format!("/product/{name}")).unwrap() else {
            panic!("duplicate product {name}")
        };
        id
    }

    fn tagged_vuln(db: &Db, link: &str, product_id: i64, tag: &str) {
        let InsertOutcome::Inserted(id) = db.insert_vulnerability(link, Some(product_id), link, 0).unwrap() else {
            panic!("duplicate vulnerability {link}")
        };
        db.insert_tag(tag, id).unwrap();
    }

    #[test]
    fn vulnerabilities_are_listed_per_product() {
        let db = Db::open_in_memory().unwrap();
        let acme = vendor(&db, "Acme");
        let suite = product(&db, "Acme Suite", acme);
        db.insert_vulnerability("CVE-X", Some(suite), "/v/1", 0).unwrap();
        db.insert_vulnerability("CVE-Y", None, "/v/2", 0).unwrap();
        let got = db.vulnerabilities_for_product("Acme Suite").unwrap();
        assert_eq!(got, vec![VulnerabilityRef { name: "CVE-X".into(), link: "/v/1".into() }]);
        assert!(db.vulnerabilities_for_product("Nothing").unwrap().is_empty());
    }

    #[test]
    fn top_vendor_wins_by_tagged_count() {
        let db = Db::open_in_memory().unwrap();
        for (i, name) in ["Alpha", "Beta"].iter().enumerate() {
            let v = vendor(&db, name);
            let p = product(&db, &format!("{name} App"), v);
            tagged_vuln(&db, &format!("/v/{i}"), p, "SUI");
        }
        let gamma = vendor(&db, "Gamma");
        let p = product(&db, "Gamma App", gamma);
        tagged_vuln(&db, "/v/g1", p, "SUI");
        tagged_vuln(&db, "/v/g2", p, "SUI");
        tagged_vuln(&db, "/v/g3", p, "RCE");

        let top = db.top_vendors_for_tag("SUI", 1).unwrap();
        assert_eq!(top, vec![VendorTally { vendor: "Gamma".into(), vulnerability_count: 2 }]);
        assert_eq!(db.top_vendors_for_tag("SUI", 10).unwrap().len(), 3);
    }

    #[test]
    fn per_call_reports_open_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        {
            let db = Db::open_or_create(&path).unwrap();
            let v = vendor(&db, "Acme");
            let p = product(&db, "Acme Suite", v);
            tagged_vuln(&db, "/v/1", p, "SUI");
        }
        let vulns = vulnerabilities_for_product(&path, "Acme Suite").unwrap();
        assert_eq!(vulns.len(), 1);
        let top = top_vendors_for_tag(&path, "SUI", 5).unwrap();
        assert_eq!(top[0].vendor, "Acme");
        assert_eq!(top[0].vulnerability_count, 1);
    }

    #[test]
    fn reports_on_missing_file_fail_without_creating_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typo.db");
        assert!(vulnerabilities_for_product(&path, "Acme Suite").is_err());
        assert!(top_vendors_for_tag(&path, "SUI", 5).is_err());
        assert!(!path.exists());
    }
}
