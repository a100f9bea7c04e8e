pub mod config;
pub mod constants;
pub mod error;
pub mod handler;
pub mod logging;
pub mod metrics;
pub mod types;

// Application core and its collaborator boundaries
pub mod app;
pub mod infra;

pub use app::ArchivePipeline;
pub use config::Config;
pub use error::{ArchiveError, InputError, Stage};
pub use handler::BatchHandler;
pub use types::{ArchiveOutcome, ArchiveRecord};
