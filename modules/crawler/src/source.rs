use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use threatdb_core::error::CrawlError;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Anything that can turn a URL into a status code and a body.
///
/// A non-success status is a normal return value. `Err` is reserved for
/// failures below HTTP (DNS, connect, TLS, body decoding).
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        HttpOptions {
            timeout_ms: 30_000,
            user_agent: format!("threatdb/{}", threatdb_core::version()),
        }
    }
}

pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(opts: &HttpOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(opts.timeout_ms))
            .user_agent(opts.user_agent.clone())
            .brotli(true)
            .gzip(true)
            .deflate(true)
            .build()?;
        Ok(HttpSource { client })
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let transport = |e: reqwest::Error| CrawlError::Transport { url: url.to_string(), message: e.to_string() };
        let resp = self.client.get(url).send().await.map_err(transport)?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Ok(FetchedPage { status, body: String::new() });
        }
        let body = resp.text().await.map_err(transport)?;
        debug!(url, status, bytes = body.len(), "fetched page");
        Ok(FetchedPage { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_2xx_only() {
        let page = |status| FetchedPage { status, body: String::new() };
        assert!(page(200).is_success());
        assert!(page(204).is_success());
        assert!(!page(301).is_success());
        assert!(!page(404).is_success());
        assert!(!page(500).is_success());
    }

    #[test]
    fn client_builds_with_defaults() {
        assert!(HttpSource::new(&HttpOptions::default()).is_ok());
    }
}
