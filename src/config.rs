use crate::app::key::KeyStrategy;
use crate::constants::*;
use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub http: HttpConfig,
    pub object_store: ObjectStoreConfig,
    pub record_store: RecordStoreConfig,
    pub pipeline: PipelineConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_HTTP_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ObjectStoreConfig {
    Fs {
        #[serde(default = "default_fs_root")]
        root: PathBuf,
    },
    Supabase {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        project_ref: Option<String>,
        #[serde(default = "default_bucket")]
        bucket: String,
        #[serde(default)]
        prefix: String,
    },
    Memory,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        ObjectStoreConfig::Fs {
            root: default_fs_root(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum RecordStoreConfig {
    Sqlite {
        #[serde(default = "default_record_db_path")]
        path: PathBuf,
        #[serde(default = "default_record_table")]
        table: String,
    },
    Memory,
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        RecordStoreConfig::Sqlite {
            path: default_record_db_path(),
            table: default_record_table(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub concurrency: usize,
    pub process_timeout_seconds: Option<u64>,
    pub key_strategy: KeyStrategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            process_timeout_seconds: None,
            key_strategy: KeyStrategy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    pub listen_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

fn default_fs_root() -> PathBuf {
    PathBuf::from(DEFAULT_FS_ROOT)
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

fn default_record_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_RECORD_DB_PATH)
}

fn default_record_table() -> String {
    DEFAULT_RECORD_TABLE.to_string()
}

impl Config {
    /// Loads configuration from `path`, or from `$THUMBER_CONFIG` / `thumber.toml`.
    ///
    /// An explicitly given file must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config_path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match std::env::var(CONFIG_PATH_ENV) {
                Ok(p) => (PathBuf::from(p), true),
                Err(_) => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
            },
        };

        if !required && !config_path.exists() {
            let config = Config::default();
            config.validate()?;
            return Ok(config);
        }

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Read {
            path: config_path.display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.timeout_seconds == 0 {
            return Err(ConfigError::Invalid("http.timeout_seconds must be positive".into()));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("http.user_agent must not be empty".into()));
        }
        if self.pipeline.concurrency == 0 {
            return Err(ConfigError::Invalid("pipeline.concurrency must be positive".into()));
        }
        if self.pipeline.process_timeout_seconds == Some(0) {
            return Err(ConfigError::Invalid(
                "pipeline.process_timeout_seconds must be positive".into(),
            ));
        }

        match &self.object_store {
            ObjectStoreConfig::Fs { root } => {
                if root.as_os_str().is_empty() {
                    return Err(ConfigError::Invalid("object_store.root must not be empty".into()));
                }
            }
            ObjectStoreConfig::Supabase {
                url,
                project_ref,
                bucket,
                ..
            } => {
                if url.is_none() && project_ref.is_none() {
                    return Err(ConfigError::Invalid(
                        "object_store requires either url or project_ref for supabase".into(),
                    ));
                }
                if bucket.trim().is_empty() {
                    return Err(ConfigError::Invalid("object_store.bucket must not be empty".into()));
                }
            }
            ObjectStoreConfig::Memory => {}
        }

        if let RecordStoreConfig::Sqlite { path, table } = &self.record_store {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("record_store.path must not be empty".into()));
            }
            if !is_sql_identifier(table) {
                return Err(ConfigError::Invalid(format!(
                    "record_store.table {:?} is not a valid table name",
                    table
                )));
            }
        }

        Ok(())
    }
}

fn is_sql_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.http.timeout_seconds, DEFAULT_HTTP_TIMEOUT_SECS);
        assert_eq!(config.pipeline.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.pipeline.key_strategy, KeyStrategy::Path);
        assert!(matches!(config.object_store, ObjectStoreConfig::Fs { .. }));
        match config.record_store {
            RecordStoreConfig::Sqlite { table, .. } => assert_eq!(table, "thumbs"),
            other => panic!("unexpected record store {:?}", other),
        }
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(
            r#"
            [http]
            timeout_seconds = 30
            user_agent = "test-agent"

            [object_store]
            kind = "supabase"
            project_ref = "abc"
            prefix = "thumbs/"

            [record_store]
            kind = "memory"

            [pipeline]
            concurrency = 8
            process_timeout_seconds = 90
            key_strategy = "url_sha256"

            [metrics]
            listen_addr = "127.0.0.1:9898"
            "#,
        )
        .unwrap();

        assert_eq!(config.http.timeout(), Duration::from_secs(30));
        assert_eq!(config.pipeline.process_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.pipeline.key_strategy, KeyStrategy::UrlSha256);
        assert!(matches!(config.record_store, RecordStoreConfig::Memory));
        match config.object_store {
            ObjectStoreConfig::Supabase { bucket, prefix, .. } => {
                assert_eq!(bucket, DEFAULT_BUCKET);
                assert_eq!(prefix, "thumbs/");
            }
            other => panic!("unexpected object store {:?}", other),
        }
        assert!(config.metrics.listen_addr.is_some());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            "[http]\ntimeout_seconds = 0",
            "[pipeline]\nconcurrency = 0",
            "[pipeline]\nprocess_timeout_seconds = 0",
            "[object_store]\nkind = \"supabase\"",
            "[record_store]\nkind = \"sqlite\"\ntable = \"thumbs; DROP TABLE x\"",
        ];
        for case in cases {
            let err = Config::from_toml_str(case).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{}: {:?}", case, err);
        }
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let cases = [
            "[http]\ntimeout = 5",
            "[object_store]\nkind = \"fs\"\nroots = \"/srv/thumbs\"",
            "[object_store]\nkind = \"supabase\"\nproject_ref = \"abc\"\nbuckets = \"x\"",
            "[record_store]\nkind = \"sqlite\"\ntabel = \"thumbs\"",
        ];
        for case in cases {
            let err = Config::from_toml_str(case).unwrap_err();
            assert!(matches!(err, ConfigError::Toml(_)), "{}: {:?}", case, err);
        }
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thumber.toml");
        fs::write(&path, "[pipeline]\nconcurrency = 2\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.pipeline.concurrency, 2);
    }
}
