#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use thumb_archiver::app::ports::{FetcherPort, ObjectStorePort, RecordStorePort};
use thumb_archiver::infra::{InMemoryObjectStore, InMemoryRecordStore};
use thumb_archiver::types::{ArchiveRecord, ByteStream, RecordWrite};
use thumb_archiver::ArchivePipeline;

/// Body stream that counts how many times it has been dropped.
struct TrackedStream {
    chunks: std::vec::IntoIter<std::io::Result<Bytes>>,
    dropped: Arc<AtomicUsize>,
}

impl Stream for TrackedStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.get_mut().chunks.next())
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeFetcher {
    pub calls: AtomicUsize,
    pub streams_dropped: Arc<AtomicUsize>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    /// URLs containing this marker fail with a transport error
    pub fail_marker: Option<String>,
    pub delay: Option<Duration>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn streams_dropped(&self) -> usize {
        self.streams_dropped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetcherPort for FakeFetcher {
    async fn get(&self, url: &str) -> anyhow::Result<ByteStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(marker) = &self.fail_marker {
            if url.contains(marker.as_str()) {
                anyhow::bail!("GET {} returned 503 Service Unavailable", url);
            }
        }

        Ok(Box::pin(TrackedStream {
            chunks: vec![Ok(Bytes::from(format!("bytes of {}", url)))].into_iter(),
            dropped: self.streams_dropped.clone(),
        }))
    }
}

#[derive(Default)]
pub struct FakeObjectStore {
    pub inner: InMemoryObjectStore,
    pub keys: Mutex<Vec<String>>,
    pub fail: bool,
    pub delay: Option<Duration>,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.keys.lock().unwrap().len()
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStorePort for FakeObjectStore {
    async fn put(&self, key: &str, data: ByteStream) -> anyhow::Result<String> {
        self.keys.lock().unwrap().push(key.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            drop(data);
            anyhow::bail!("quota exceeded");
        }
        self.inner.put(key, data).await
    }
}

#[derive(Default)]
pub struct FakeRecordStore {
    pub inner: InMemoryRecordStore,
    pub gets: AtomicUsize,
    pub puts: Mutex<Vec<ArchiveRecord>>,
    pub fail_get: bool,
    pub fail_put: bool,
    /// Reads report nothing, as if another worker wrote after our lookup
    pub hide_on_get: bool,
}

impl FakeRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_record(key: &str, url: &str, location: &str) -> Self {
        let store = Self::default();
        store
            .inner
            .put(&ArchiveRecord::new(key, url, location))
            .await
            .unwrap();
        store
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> Vec<ArchiveRecord> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStorePort for FakeRecordStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<ArchiveRecord>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get {
            anyhow::bail!("connection reset by peer");
        }
        if self.hide_on_get {
            return Ok(None);
        }
        self.inner.get(key).await
    }

    async fn put(&self, record: &ArchiveRecord) -> anyhow::Result<RecordWrite> {
        self.puts.lock().unwrap().push(record.clone());
        if self.fail_put {
            anyhow::bail!("provisioned throughput exceeded");
        }
        self.inner.put(record).await
    }
}

pub struct Harness {
    pub fetcher: Arc<FakeFetcher>,
    pub objects: Arc<FakeObjectStore>,
    pub records: Arc<FakeRecordStore>,
}

impl Harness {
    pub fn new(fetcher: FakeFetcher, objects: FakeObjectStore, records: FakeRecordStore) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            objects: Arc::new(objects),
            records: Arc::new(records),
        }
    }

    pub fn default_fakes() -> Self {
        Self::new(FakeFetcher::new(), FakeObjectStore::new(), FakeRecordStore::new())
    }

    pub fn pipeline(&self) -> ArchivePipeline {
        ArchivePipeline::new(self.fetcher.clone(), self.objects.clone(), self.records.clone())
    }
}
