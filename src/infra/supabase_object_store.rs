use crate::app::ports::ObjectStorePort;
use crate::config::HttpConfig;
use crate::types::ByteStream;
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context as TaskContext, Poll};
use tracing::debug;

/// Uploads objects to a Supabase Storage bucket.
///
/// Objects are written with `upsert=true`, so a retried upload of the same key
/// replaces the earlier bytes instead of failing.
pub struct SupabaseObjectStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    prefix: String,
    service_key: String,
}

impl SupabaseObjectStore {
    pub fn new(
        base_url: &str,
        bucket: &str,
        prefix: &str,
        service_key: String,
        http: &HttpConfig,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(http.timeout())
            .user_agent(http.user_agent.clone())
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            prefix: prefix.trim_matches('/').to_string(),
            service_key,
        })
    }

    pub fn project_url(project_ref: &str) -> String {
        format!("https://{}.supabase.co", project_ref)
    }

    pub fn object_path(&self, key: &str) -> String {
        let key = key.trim_start_matches('/');
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }

    pub fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            self.object_path(key)
        )
    }
}

#[async_trait]
impl ObjectStorePort for SupabaseObjectStore {
    async fn put(&self, key: &str, data: ByteStream) -> anyhow::Result<String> {
        let endpoint = self.object_url(key);
        let resp = self
            .client
            .put(&endpoint)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("apikey", self.service_key.clone())
            .header(reqwest::header::CONTENT_TYPE, content_type_for(key))
            .query(&[("upsert", "true")])
            .body(reqwest::Body::wrap_stream(SyncStream::new(data)))
            .send()
            .await
            .with_context(|| format!("PUT {} failed", endpoint))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Supabase upload failed: {} - {}", status, body));
        }

        debug!(%endpoint, "uploaded object");
        Ok(endpoint)
    }
}

fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Request bodies must be `Sync`; the stream is only ever polled through `&mut`.
struct SyncStream(Mutex<ByteStream>);

impl SyncStream {
    fn new(inner: ByteStream) -> Self {
        Self(Mutex::new(inner))
    }
}

impl Stream for SyncStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut()
            .0
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
            .poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(prefix: &str) -> SupabaseObjectStore {
        SupabaseObjectStore::new(
            "https://abc.supabase.co/",
            "apthunt.thumbs",
            prefix,
            "secret".into(),
            &HttpConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_object_url_layout() {
        assert_eq!(
            store("").object_url("/img.jpg"),
            "https://abc.supabase.co/storage/v1/object/apthunt.thumbs/img.jpg"
        );
        assert_eq!(
            store("/thumbs/").object_url("/1/2.png"),
            "https://abc.supabase.co/storage/v1/object/apthunt.thumbs/thumbs/1/2.png"
        );
    }

    #[test]
    fn test_project_url() {
        assert_eq!(
            SupabaseObjectStore::project_url("xyzcompany"),
            "https://xyzcompany.supabase.co"
        );
    }

    #[test]
    fn test_content_type_guess() {
        assert_eq!(content_type_for("/a/B.JPG"), "image/jpeg");
        assert_eq!(content_type_for("/a/b.webp"), "image/webp");
        assert_eq!(content_type_for("/sha256/ab/cd/abcd"), "application/octet-stream");
    }
}
