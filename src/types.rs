use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Streaming resource body. Dropping the stream releases the underlying connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Durable proof that a URL has been fetched and stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub key: String,
    pub url: String,
    pub location: String,
    pub uploaded_at: DateTime<Utc>,
}

impl ArchiveRecord {
    pub fn new(key: impl Into<String>, url: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
            location: location.into(),
            uploaded_at: Utc::now(),
        }
    }
}

/// Result of a write-once record insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordWrite {
    Created,
    /// The same URL was already recorded under this key; nothing was written.
    AlreadyPresent,
    /// The key is taken by a record for another URL; nothing was written.
    Conflict(ArchiveRecord),
}

/// Terminal success state of a `process` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ArchiveOutcome {
    AlreadyCached,
    AlreadyRecorded { location: String },
    Archived { location: String },
}

impl ArchiveOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            ArchiveOutcome::AlreadyCached => "cached",
            ArchiveOutcome::AlreadyRecorded { .. } => "recorded",
            ArchiveOutcome::Archived { .. } => "archived",
        }
    }

    /// True when this call performed the fetch and upload itself.
    pub fn did_work(&self) -> bool {
        matches!(self, ArchiveOutcome::Archived { .. })
    }
}
