use crate::app::ports::{FetcherPort, ObjectStorePort, RecordStorePort};
use crate::app::ArchivePipeline;
use crate::config::{Config, ObjectStoreConfig, RecordStoreConfig};
use crate::constants::SUPABASE_KEY_ENV;
use crate::error::ConfigError;
use crate::infra::fs_object_store::FsObjectStore;
use crate::infra::http_client::ReqwestFetcher;
use crate::infra::in_memory::{InMemoryObjectStore, InMemoryRecordStore};
use crate::infra::sqlite_record_store::SqliteRecordStore;
use crate::infra::supabase_object_store::SupabaseObjectStore;
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

/// Builds a pipeline with every collaborator constructed from `config`.
pub fn build_pipeline(config: &Config) -> anyhow::Result<ArchivePipeline> {
    config.validate()?;

    let fetcher: Arc<dyn FetcherPort> = Arc::new(ReqwestFetcher::new(&config.http)?);
    let objects = build_object_store(config)?;
    let records = build_record_store(config)?;

    Ok(ArchivePipeline::new(fetcher, objects, records)
        .with_key_strategy(config.pipeline.key_strategy)
        .with_process_timeout(config.pipeline.process_timeout()))
}

pub fn build_object_store(config: &Config) -> anyhow::Result<Arc<dyn ObjectStorePort>> {
    match &config.object_store {
        ObjectStoreConfig::Fs { root } => {
            info!("Using filesystem object store at {}", root.display());
            Ok(Arc::new(FsObjectStore::new(root.clone())))
        }
        ObjectStoreConfig::Supabase {
            url,
            project_ref,
            bucket,
            prefix,
        } => {
            let base_url = match (url, project_ref) {
                (Some(u), _) => u.clone(),
                (None, Some(r)) => SupabaseObjectStore::project_url(r),
                (None, None) => {
                    return Err(ConfigError::Invalid(
                        "object_store requires either url or project_ref for supabase".into(),
                    )
                    .into())
                }
            };
            let key = std::env::var(SUPABASE_KEY_ENV).map_err(|source| ConfigError::Env {
                name: SUPABASE_KEY_ENV,
                source,
            })?;
            info!("Using Supabase object store {}/{}", base_url, bucket);
            Ok(Arc::new(SupabaseObjectStore::new(
                &base_url,
                bucket,
                prefix,
                key,
                &config.http,
            )?))
        }
        ObjectStoreConfig::Memory => {
            info!("Using in-memory object store");
            Ok(Arc::new(InMemoryObjectStore::new()))
        }
    }
}

pub fn build_record_store(config: &Config) -> anyhow::Result<Arc<dyn RecordStorePort>> {
    match &config.record_store {
        RecordStoreConfig::Sqlite { path, table } => {
            info!("Using SQLite record store {} (table {})", path.display(), table);
            let store = SqliteRecordStore::open(path, table)
                .with_context(|| format!("failed to open record store {}", path.display()))?;
            Ok(Arc::new(store))
        }
        RecordStoreConfig::Memory => {
            info!("Using in-memory record store");
            Ok(Arc::new(InMemoryRecordStore::new()))
        }
    }
}
