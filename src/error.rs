use std::fmt;
use thiserror::Error;

/// Pipeline step at which a `Process` call stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validate,
    Lookup,
    Fetch,
    Upload,
    Record,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Lookup => "lookup",
            Stage::Fetch => "fetch",
            Stage::Upload => "upload",
            Stage::Record => "record",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    TimedOut,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => f.write_str("cancelled"),
            CancelReason::TimedOut => f.write_str("timed out"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to look up archive record for {url}: {source}")]
    LookupFailed {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to fetch {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to upload {url} under key {key:?}: {source}")]
    UploadFailed {
        url: String,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to write archive record for {url}: {source}")]
    RecordWriteFailed {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("key mismatch at {stage} for key {key:?}: requested {url:?}, stored {stored_url:?}")]
    KeyMismatch {
        url: String,
        key: String,
        stored_url: String,
        stage: Stage,
    },

    #[error("processing {url} {reason} during {stage}")]
    Cancelled {
        url: String,
        stage: Stage,
        reason: CancelReason,
    },
}

impl ArchiveError {
    pub fn url(&self) -> &str {
        match self {
            ArchiveError::InvalidUrl { url, .. }
            | ArchiveError::LookupFailed { url, .. }
            | ArchiveError::FetchFailed { url, .. }
            | ArchiveError::UploadFailed { url, .. }
            | ArchiveError::RecordWriteFailed { url, .. }
            | ArchiveError::KeyMismatch { url, .. }
            | ArchiveError::Cancelled { url, .. } => url,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            ArchiveError::InvalidUrl { .. } => Stage::Validate,
            ArchiveError::LookupFailed { .. } => Stage::Lookup,
            ArchiveError::FetchFailed { .. } => Stage::Fetch,
            ArchiveError::UploadFailed { .. } => Stage::Upload,
            ArchiveError::RecordWriteFailed { .. } => Stage::Record,
            ArchiveError::KeyMismatch { stage, .. } => *stage,
            ArchiveError::Cancelled { stage, .. } => *stage,
        }
    }

    /// Whether redelivering the same URL can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ArchiveError::InvalidUrl { .. } | ArchiveError::KeyMismatch { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ArchiveError::Cancelled { .. })
    }
}

/// A single malformed entry in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEntry {
    pub index: usize,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for InvalidEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {:?}: {}", self.index, self.value, self.reason)
    }
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("found {} malformed url(s): {}", .0.len(), join_entries(.0))]
    MalformedUrls(Vec<InvalidEntry>),
}

impl InputError {
    pub fn invalid_entries(&self) -> &[InvalidEntry] {
        match self {
            InputError::MalformedUrls(entries) => entries,
        }
    }
}

fn join_entries(entries: &[InvalidEntry]) -> String {
    entries
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("environment variable error for {name}: {source}")]
    Env {
        name: &'static str,
        #[source]
        source: std::env::VarError,
    },
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
