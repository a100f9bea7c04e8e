use crate::app::ports::RecordStorePort;
use crate::types::{ArchiveRecord, RecordWrite};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Archive records in a SQLite table, one row per derived key.
///
/// Calls run on the blocking pool; the connection is shared behind a mutex.
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
    table: Arc<str>,
}

impl SqliteRecordStore {
    /// `table` must be a plain SQL identifier; `Config::validate` enforces this.
    pub fn open<P: AsRef<Path>>(db_path: P, table: &str) -> anyhow::Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        Self::init(conn, table)
    }

    pub fn open_in_memory(table: &str) -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?, table)
    }

    fn init(conn: Connection, table: &str) -> anyhow::Result<Self> {
        conn.execute_batch(&format!(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS {table} (
                key          TEXT PRIMARY KEY,
                url          TEXT NOT NULL,
                location     TEXT NOT NULL,
                upload_time  INTEGER NOT NULL
            );
            "#
        ))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table: Arc::from(table),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> anyhow::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        let table = self.table.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| anyhow!("record store connection lock poisoned"))?;
            f(&*guard, &*table)
        })
        .await
        .context("record store task failed")?
    }
}

fn select_record(conn: &Connection, table: &str, key: &str) -> anyhow::Result<Option<ArchiveRecord>> {
    let sql = format!("SELECT key, url, location, upload_time FROM {table} WHERE key = ?1");
    let row = conn
        .query_row(&sql, params![key], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })
        .optional()?;

    row.map(|(key, url, location, upload_time)| {
        let uploaded_at = DateTime::<Utc>::from_timestamp(upload_time, 0)
            .ok_or_else(|| anyhow!("invalid upload_time {} for key {:?}", upload_time, key))?;
        Ok(ArchiveRecord {
            key,
            url,
            location,
            uploaded_at,
        })
    })
    .transpose()
}

#[async_trait]
impl RecordStorePort for SqliteRecordStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<ArchiveRecord>> {
        let key = key.to_string();
        self.with_conn(move |conn, table| select_record(conn, table, &key))
            .await
    }

    async fn put(&self, record: &ArchiveRecord) -> anyhow::Result<RecordWrite> {
        let record = record.clone();
        self.with_conn(move |conn, table| {
            let inserted = conn.execute(
                &format!(
                    "INSERT INTO {table} (key, url, location, upload_time) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(key) DO NOTHING"
                ),
                params![
                    record.key,
                    record.url,
                    record.location,
                    record.uploaded_at.timestamp()
                ],
            )?;
            if inserted == 1 {
                return Ok(RecordWrite::Created);
            }

            let existing = select_record(conn, table, &record.key)?
                .ok_or_else(|| anyhow!("record for key {:?} vanished after conflict", record.key))?;
            if existing.url == record.url {
                Ok(RecordWrite::AlreadyPresent)
            } else {
                Ok(RecordWrite::Conflict(existing))
            }
        })
        .await
    }
}
