//! Row extraction for the catalog listings and tag tokens for detail pages.
//!
//! Every listing is a run of `div.table__row` elements. Rows flagged as header
//! or cover, and rows without a `table__col_title` cell, are page decoration
//! and are dropped without comment. Any other row that cannot be read is
//! dropped too, but recorded as a [`RowIssue`] so the caller can report it.

use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use threatdb_core::error::CrawlError;
use threatdb_core::{CatalogKind, NOT_AVAILABLE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorRow {
    pub name: String,
    pub count_products: i64,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    pub name: String,
    pub link: String,
    pub vendor_name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VulnerabilityRow {
    pub name: String,
    /// `N/A` when the title cell carries no anchor.
    pub link: String,
    /// `N/A` when the row has fewer than three columns.
    pub product_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssue {
    /// Position among the page's `table__row` elements.
    pub index: usize,
    pub error: CrawlError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction<T> {
    pub rows: Vec<T>,
    pub issues: Vec<RowIssue>,
    pub decoration: usize,
}

impl<T> Default for Extraction<T> {
    fn default() -> Self {
        Extraction { rows: Vec::new(), issues: Vec::new(), decoration: 0 }
    }
}

impl<T> Extraction<T> {
    /// No data rows at all, readable or not. A listing past its last page looks like this.
    pub fn is_exhausted(&self) -> bool {
        self.rows.is_empty() && self.issues.is_empty()
    }
}

struct Selectors {
    row: Selector,
    title: Selector,
    col: Selector,
    no_mobile: Selector,
    anchor: Selector,
    tags: Selector,
    tag: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        let parse = |s: &str| Selector::parse(s).expect("static selector");
        Selectors {
            row: parse("div.table__row"),
            title: parse("div.table__col_title"),
            col: parse("div.table__col"),
            no_mobile: parse("div.table__col_no-mobile"),
            anchor: parse("a"),
            tags: parse("div.tags"),
            tag: parse("div.tags__tag"),
        }
    })
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn is_decoration_row(row: ElementRef<'_>) -> bool {
    row.value()
        .classes()
        .any(|c| c == "table__row_header" || c == "table__row_cover")
}

fn href_of(title: ElementRef<'_>) -> Option<String> {
    title
        .select(&selectors().anchor)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

fn parse_count(kind: CatalogKind, field: &'static str, raw: &str) -> Result<i64, CrawlError> {
    let digits: String = raw.chars().filter(|c| !c.is_whitespace() && *c != ',').collect();
    digits
        .parse()
        .map_err(|_| CrawlError::BadNumber { kind, field, value: raw.to_string() })
}

/// Walk the data rows of a listing, handing each row and its title cell to `read`.
fn extract_rows<T>(
    html: &str,
    read: impl Fn(ElementRef<'_>, ElementRef<'_>) -> Result<T, CrawlError>,
) -> Extraction<T> {
    let doc = Html::parse_document(html);
    let sel = selectors();
    let mut out = Extraction::default();
    for (index, row) in doc.select(&sel.row).enumerate() {
        if is_decoration_row(row) {
            out.decoration += 1;
            continue;
        }
        let Some(title) = row.select(&sel.title).next() else {
            out.decoration += 1;
            continue;
        };
        match read(row, title) {
            Ok(r) => out.rows.push(r),
            Err(error) => out.issues.push(RowIssue { index, error }),
        }
    }
    out
}

pub fn extract_vendors(html: &str) -> Extraction<VendorRow> {
    const KIND: CatalogKind = CatalogKind::Vendor;
    extract_rows(html, |row, title| {
        let count_cell = row
            .select(&selectors().no_mobile)
            .next()
            .ok_or(CrawlError::MissingField { kind: KIND, field: "product count" })?;
        let count_products = parse_count(KIND, "product count", &text_of(count_cell))?;
        let link = href_of(title).ok_or(CrawlError::MissingField { kind: KIND, field: "link" })?;
        Ok(VendorRow { name: text_of(title), count_products, link })
    })
}

pub fn extract_products(html: &str) -> Extraction<ProductRow> {
    const KIND: CatalogKind = CatalogKind::Product;
    extract_rows(html, |row, title| {
        let link = href_of(title).ok_or(CrawlError::MissingField { kind: KIND, field: "link" })?;
        let cols: Vec<ElementRef<'_>> = row.select(&selectors().col).collect();
        let vendor = cols
            .get(1)
            .ok_or(CrawlError::MissingField { kind: KIND, field: "vendor column" })?;
        let value = cols
            .get(2)
            .ok_or(CrawlError::MissingField { kind: KIND, field: "value column" })?;
        Ok(ProductRow {
            name: text_of(title),
            link,
            vendor_name: text_of(*vendor),
            value: parse_count(KIND, "value", &text_of(*value))?,
        })
    })
}

pub fn extract_vulnerabilities(html: &str) -> Extraction<VulnerabilityRow> {
    extract_rows(html, |row, title| {
        let product_name = row
            .select(&selectors().col)
            .nth(2)
            .map(text_of)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        Ok(VulnerabilityRow {
            name: text_of(title),
            link: href_of(title).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            product_name,
        })
    })
}

/// First word of every `tags__tag` inside the page's first `div.tags`.
pub fn extract_tags(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let sel = selectors();
    let Some(block) = doc.select(&sel.tags).next() else {
        return Vec::new();
    };
    block
        .select(&sel.tag)
        .filter_map(|t| t.text().collect::<String>().split_whitespace().next().map(str::to_string))
        .collect()
}
