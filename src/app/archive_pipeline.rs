use crate::app::existence_cache::ExistenceCache;
use crate::app::key::{KeyDeriver, KeyStrategy};
use crate::app::ports::{FetcherPort, ObjectStorePort, RecordStorePort};
use crate::error::{ArchiveError, CancelReason, Result, Stage};
use crate::types::{ArchiveOutcome, ArchiveRecord, RecordWrite};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Fetches each URL at most once and records completion durably.
///
/// Order per call: existence cache → durable record lookup → fetch → upload →
/// record write → cache insert. No step is retried here; callers redeliver.
/// A crash between upload and record write leaves an orphaned object that a
/// retry overwrites, never a record without an object.
pub struct ArchivePipeline {
    fetcher: Arc<dyn FetcherPort>,
    objects: Arc<dyn ObjectStorePort>,
    records: Arc<dyn RecordStorePort>,
    keys: KeyDeriver,
    cache: ExistenceCache,
    process_timeout: Option<Duration>,
}

impl ArchivePipeline {
    pub fn new(
        fetcher: Arc<dyn FetcherPort>,
        objects: Arc<dyn ObjectStorePort>,
        records: Arc<dyn RecordStorePort>,
    ) -> Self {
        Self {
            fetcher,
            objects,
            records,
            keys: KeyDeriver::default(),
            cache: ExistenceCache::new(),
            process_timeout: None,
        }
    }

    pub fn with_key_strategy(mut self, strategy: KeyStrategy) -> Self {
        self.keys = KeyDeriver::new(strategy);
        self
    }

    /// Deadline applied to each `process` call as a whole.
    pub fn with_process_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.process_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &ExistenceCache {
        &self.cache
    }

    pub fn keys(&self) -> &KeyDeriver {
        &self.keys
    }

    #[instrument(name = "archive", skip_all, fields(url = %url))]
    pub async fn process(&self, cancel: &CancellationToken, url: &str) -> Result<ArchiveOutcome> {
        let started = std::time::Instant::now();
        let deadline = self.process_timeout.map(|t| Instant::now() + t);

        let result = self.run(cancel, deadline, url).await;
        crate::metrics::archive::process_duration(started.elapsed().as_secs_f64());

        match &result {
            Ok(outcome) => crate::metrics::archive::outcome(outcome.kind()),
            Err(e) => {
                crate::metrics::archive::failure(e.stage());
                warn!(stage = %e.stage(), retryable = e.is_retryable(), "archive failed: {}", e);
            }
        }
        result
    }

    /// Reads the durable record for `url` without touching the cache.
    pub async fn lookup(&self, url: &str) -> Result<Option<ArchiveRecord>> {
        let key = self.keys.derive(url)?;
        let record = self
            .records
            .get(&key)
            .await
            .map_err(|source| ArchiveError::LookupFailed {
                url: url.to_string(),
                source,
            })?;
        match record {
            Some(r) if r.url != url => Err(key_mismatch(url, &key, &r.url, Stage::Lookup)),
            other => Ok(other),
        }
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
        url: &str,
    ) -> Result<ArchiveOutcome> {
        if self.cache.contains(url) {
            debug!("already archived in this process");
            return Ok(ArchiveOutcome::AlreadyCached);
        }

        let key = self.keys.derive(url)?;

        let existing = self
            .step(cancel, deadline, url, Stage::Lookup, self.records.get(&key))
            .await?
            .map_err(|source| ArchiveError::LookupFailed {
                url: url.to_string(),
                source,
            })?;

        if let Some(record) = existing {
            if record.url != url {
                return Err(key_mismatch(url, &key, &record.url, Stage::Lookup));
            }
            info!(location = %record.location, "already archived");
            self.cache.add(url);
            return Ok(ArchiveOutcome::AlreadyRecorded {
                location: record.location,
            });
        }

        let body = self
            .step(cancel, deadline, url, Stage::Fetch, self.fetcher.get(url))
            .await?
            .map_err(|source| ArchiveError::FetchFailed {
                url: url.to_string(),
                source,
            })?;

        // The body moves into the upload future and is dropped with it on any exit.
        let upload_started = std::time::Instant::now();
        let location = self
            .step(cancel, deadline, url, Stage::Upload, self.objects.put(&key, body))
            .await?
            .map_err(|source| ArchiveError::UploadFailed {
                url: url.to_string(),
                key: key.clone(),
                source,
            })?;
        crate::metrics::archive::upload_duration(upload_started.elapsed().as_secs_f64());
        debug!(%key, %location, "uploaded");

        let record = ArchiveRecord::new(key.clone(), url, location.clone());
        let write = self
            .step(cancel, deadline, url, Stage::Record, self.records.put(&record))
            .await?
            .map_err(|source| ArchiveError::RecordWriteFailed {
                url: url.to_string(),
                source,
            })?;

        match write {
            RecordWrite::Created => info!(%location, "archived"),
            RecordWrite::AlreadyPresent => {
                info!(%location, "archived; record already written by a concurrent worker")
            }
            RecordWrite::Conflict(existing) => {
                return Err(key_mismatch(url, &key, &existing.url, Stage::Record));
            }
        }

        self.cache.add(url);
        Ok(ArchiveOutcome::Archived { location })
    }

    /// Runs one blocking step, abandoning it on cancellation or deadline.
    async fn step<T>(
        &self,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
        url: &str,
        stage: Stage,
        fut: impl Future<Output = T>,
    ) -> Result<T> {
        let cancelled = |reason| ArchiveError::Cancelled {
            url: url.to_string(),
            stage,
            reason,
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(cancelled(CancelReason::Cancelled)),
            _ = sleep_until(deadline) => Err(cancelled(CancelReason::TimedOut)),
            out = fut => Ok(out),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

fn key_mismatch(url: &str, key: &str, stored_url: &str, stage: Stage) -> ArchiveError {
    ArchiveError::KeyMismatch {
        url: url.to_string(),
        key: key.to_string(),
        stored_url: stored_url.to_string(),
        stage,
    }
}
