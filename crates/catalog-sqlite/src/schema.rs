/// Catalog tables. Every statement is create-if-absent so the batch can run on
/// each open without touching existing rows.
pub const CATALOG_SCHEMA: &str = r#"
BEGIN;

CREATE TABLE IF NOT EXISTS vendors (
  id              INTEGER PRIMARY KEY,
  name            TEXT UNIQUE,
  count_products  INTEGER,
  link            TEXT
);

CREATE TABLE IF NOT EXISTS products (
  id              INTEGER PRIMARY KEY,
  name            TEXT,
  vendor_id       INTEGER REFERENCES vendors(id),
  value           INTEGER,
  link            TEXT,
  UNIQUE (name, link)
);

CREATE TABLE IF NOT EXISTS vulnerabilities (
  id              INTEGER PRIMARY KEY,
  name            TEXT,
  product_id      INTEGER NOT NULL DEFAULT 0 REFERENCES products(id),
  link            TEXT UNIQUE,
  article_id      INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS tags (
  id               INTEGER PRIMARY KEY,
  tag              TEXT,
  vulnerability_id INTEGER REFERENCES vulnerabilities(id),
  UNIQUE (tag, vulnerability_id)
);

CREATE INDEX IF NOT EXISTS idx_products_vendor ON products(vendor_id);
CREATE INDEX IF NOT EXISTS idx_products_name ON products(name);
CREATE INDEX IF NOT EXISTS idx_vulns_product ON vulnerabilities(product_id);
CREATE INDEX IF NOT EXISTS idx_tags_vuln ON tags(vulnerability_id);
CREATE INDEX IF NOT EXISTS idx_tags_tag ON tags(tag);

COMMIT;
"#;

pub const CATALOG_TABLES: [&str; 4] = ["vendors", "products", "vulnerabilities", "tags"];
