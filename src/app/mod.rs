pub mod archive_pipeline;
pub mod existence_cache;
pub mod key;
pub mod ports;

pub use archive_pipeline::ArchivePipeline;
pub use existence_cache::ExistenceCache;
pub use key::{derive_key, KeyDeriver, KeyStrategy};
