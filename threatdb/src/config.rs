use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG: &str = "threatdb.yaml";

#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CrawlConfig {
    pub vendor_url: Option<String>,
    pub product_url: Option<String>,
    pub vulnerability_url: Option<String>,
    pub delay_ms: Option<u64>,
    pub tag_concurrency: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
    pub max_pages: Option<u32>,
    pub db: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub crawl: Option<CrawlConfig>,
}

/// An explicit path must exist and parse. Without one, `./threatdb.yaml` is
/// used when present and ignored otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() { p.to_path_buf() } else { return Ok(Config::default()); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    parse_config(&s).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_config(s: &str) -> Result<Config> {
    Ok(serde_yaml::from_str(s)?)
}
