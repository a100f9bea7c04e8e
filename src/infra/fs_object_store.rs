use crate::app::ports::ObjectStorePort;
use crate::types::ByteStream;
use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stores objects as files under `root`, one file per key.
///
/// Bytes are streamed into a hidden sibling file and renamed into place only
/// after the stream completes, so a failed or abandoned upload never leaves a
/// file at the key's path.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn object_path(&self, key: &str) -> anyhow::Result<PathBuf> {
        let rel = Path::new(key.trim_start_matches('/'));
        if rel.as_os_str().is_empty() {
            bail!("empty object key");
        }
        for component in rel.components() {
            if !matches!(component, Component::Normal(_)) {
                bail!("object key {:?} escapes the store root", key);
            }
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ObjectStorePort for FsObjectStore {
    async fn put(&self, key: &str, mut data: ByteStream) -> anyhow::Result<String> {
        let path = self.object_path(key)?;
        let parent = path.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = parent.join(format!(
            ".{}.partial-{}-{}",
            file_name,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let guard = TempFileGuard::new(tmp_path.clone());

        let mut file = fs::File::create(&tmp_path)
            .await
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        let mut written: u64 = 0;
        while let Some(chunk) = data.next().await {
            let chunk = chunk.context("failed reading source stream")?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("failed to move object into {}", path.display()))?;
        guard.disarm();

        debug!(path = %path.display(), bytes = written, "stored object");
        Ok(format!("file://{}", path.display()))
    }
}

/// Removes the temporary file unless disarmed, including when the upload future is dropped.
struct TempFileGuard {
    path: Option<PathBuf>,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn disarm(mut self) {
        self.path = None;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}
