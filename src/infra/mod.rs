pub mod factory;
pub mod fs_object_store;
pub mod http_client;
pub mod in_memory;
pub mod sqlite_record_store;
pub mod supabase_object_store;

pub use factory::build_pipeline;
pub use fs_object_store::FsObjectStore;
pub use http_client::ReqwestFetcher;
pub use in_memory::{InMemoryObjectStore, InMemoryRecordStore};
pub use sqlite_record_store::SqliteRecordStore;
pub use supabase_object_store::SupabaseObjectStore;
