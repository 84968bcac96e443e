//! Catalog crawl: paginated listing phases followed by a bounded tag fan-out.

mod pipeline;
mod report;
mod source;
mod tags;

pub use pipeline::{
    CrawlOptions, Crawler, Stages, DEFAULT_PRODUCT_URL, DEFAULT_VENDOR_URL, DEFAULT_VULNERABILITY_URL,
};
pub use report::{PhaseEnd, PhaseReport, PipelineReport, TagReport};
pub use source::{FetchedPage, HttpOptions, HttpSource, PageSource};
