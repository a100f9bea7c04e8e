//! Default values for configuration fields not set in the config file.

pub const DEFAULT_CONFIG_PATH: &str = "thumber.toml";
pub const CONFIG_PATH_ENV: &str = "THUMBER_CONFIG";

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_USER_AGENT: &str = concat!("thumber/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_FS_ROOT: &str = "data/thumbs";
pub const DEFAULT_BUCKET: &str = "apthunt.thumbs";

pub const DEFAULT_RECORD_DB_PATH: &str = "data/records.db";
pub const DEFAULT_RECORD_TABLE: &str = "thumbs";

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_LOG_DIR: &str = "logs";

pub const SUPABASE_KEY_ENV: &str = "SUPABASE_SERVICE_ROLE_KEY";
