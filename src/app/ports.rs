use crate::types::{ArchiveRecord, ByteStream, RecordWrite};
use async_trait::async_trait;

/// Network GET for a resource URL.
#[async_trait]
pub trait FetcherPort: Send + Sync {
    /// Returns the body positioned at its start. Non-success responses are errors.
    async fn get(&self, url: &str) -> anyhow::Result<ByteStream>;
}

/// Keyed blob store.
#[async_trait]
pub trait ObjectStorePort: Send + Sync {
    /// Consumes `data` fully before returning an opaque, durable location.
    /// A failed put must not leave a readable object under `key`.
    async fn put(&self, key: &str, data: ByteStream) -> anyhow::Result<String>;
}

/// Durable key-value store of archive records, keyed by derived key.
#[async_trait]
pub trait RecordStorePort: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<ArchiveRecord>>;

    /// Write-once insert; never overwrites an existing record.
    async fn put(&self, record: &ArchiveRecord) -> anyhow::Result<RecordWrite>;
}
