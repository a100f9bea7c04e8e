use crate::app::ports::{ObjectStorePort, RecordStorePort};
use crate::types::{ArchiveRecord, ByteStream, RecordWrite};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// In-memory object store for development/testing
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStorePort for InMemoryObjectStore {
    async fn put(&self, key: &str, mut data: ByteStream) -> anyhow::Result<String> {
        // Buffer fully first so a failed stream stores nothing
        let mut bytes = Vec::new();
        while let Some(chunk) = data.next().await {
            bytes.extend_from_slice(&chunk?);
        }
        debug!("Stored {} bytes under {}", bytes.len(), key);
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), bytes);
        Ok(format!("memory://{}", key))
    }
}

/// In-memory record store for development/testing
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Mutex<HashMap<String, ArchiveRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStorePort for InMemoryRecordStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<ArchiveRecord>> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(key).cloned())
    }

    async fn put(&self, record: &ArchiveRecord) -> anyhow::Result<RecordWrite> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let write = match records.entry(record.key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                RecordWrite::Created
            }
            Entry::Occupied(existing) if existing.get().url == record.url => {
                RecordWrite::AlreadyPresent
            }
            Entry::Occupied(existing) => RecordWrite::Conflict(existing.get().clone()),
        };
        debug!("Record write for {}: {:?}", record.key, write);
        Ok(write)
    }
}
