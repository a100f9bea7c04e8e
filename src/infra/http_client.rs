use crate::app::ports::FetcherPort;
use crate::config::HttpConfig;
use crate::types::ByteStream;
use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

/// `reqwest`-backed fetcher with a whole-request timeout.
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(config: &HttpConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FetcherPort for ReqwestFetcher {
    async fn get(&self, url: &str) -> anyhow::Result<ByteStream> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("GET {} returned {}", url, status);
        }

        debug!(status = status.as_u16(), content_length = ?resp.content_length(), "fetched");

        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)));
        Ok(Box::pin(body))
    }
}
