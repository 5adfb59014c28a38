//! Configuration for pixiv-mirror
//!
//! Options come from three layers: built-in defaults, an optional TOML
//! config file, and command-line flags. A flag overrides the file, the
//! file overrides the default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::app::client::ClientConfig;
use crate::app::retry::RetryPolicy;
use crate::errors::ConfigError;

/// Config file looked for in the working directory when none is named.
pub const DEFAULT_CONFIG_FILE: &str = "pixiv.toml";

/// The full options surface consumed by the pipeline core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadOptions {
    // Downloader behavior
    pub download_path: PathBuf,
    pub filename_pattern: String,
    pub parse_parallel: usize,
    pub download_parallel: usize,
    pub scan_interval_sec: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub parse_timeout_ms: u64,
    pub download_timeout_ms: u64,
    pub service_mode: bool,

    // Discovery scope
    pub download_bookmarks_uids: Vec<String>,
    pub download_artist_uids: Vec<String>,
    pub download_illust_ids: Vec<String>,

    // Filters
    pub user_white_list: Vec<String>,
    pub user_block_list: Vec<String>,
    pub no_r18: bool,
    pub only_p0: bool,
    pub bookmark_gt: u32,
    pub like_gt: u32,
    pub pixel_gt: u32,

    // Transport
    pub cookie: String,
    pub user_agent: String,
    pub proxy: Option<String>,

    // Catalog
    pub database_type: String,
    pub sqlite_path: PathBuf,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            download_path: PathBuf::from("pixiv"),
            filename_pattern: "{id}".to_string(),
            parse_parallel: 5,
            download_parallel: 10,
            scan_interval_sec: 3600,
            max_retries: u32::MAX,
            retry_backoff_ms: 10_000,
            parse_timeout_ms: 5_000,
            download_timeout_ms: 600_000,
            service_mode: false,
            download_bookmarks_uids: Vec::new(),
            download_artist_uids: Vec::new(),
            download_illust_ids: Vec::new(),
            user_white_list: Vec::new(),
            user_block_list: Vec::new(),
            no_r18: false,
            only_p0: false,
            bookmark_gt: 0,
            like_gt: 0,
            pixel_gt: 0,
            cookie: String::new(),
            user_agent: crate::constants::http::DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            database_type: "SQLITE".to_string(),
            sqlite_path: PathBuf::from("storage"),
        }
    }
}

impl DownloadOptions {
    /// Load options from a TOML file. With an explicit path a missing
    /// file is an error; the implicit default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(source) if !required && source.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        Ok(toml::from_str(&text)?)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parse_parallel == 0 {
            return Err(ConfigError::InvalidValue {
                field: "parse_parallel".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.download_parallel == 0 {
            return Err(ConfigError::InvalidValue {
                field: "download_parallel".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.service_mode && self.scan_interval_sec == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scan_interval_sec".to_string(),
                reason: "must be non-zero in service mode".to_string(),
            });
        }
        Ok(())
    }

    /// Retry policy shared by all stage workers.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_backoff_ms))
    }

    /// Client settings for the discovery and info pools.
    pub fn parse_client_config(&self) -> ClientConfig {
        self.client_config(Duration::from_millis(self.parse_timeout_ms))
    }

    /// Client settings for the download pool.
    pub fn download_client_config(&self) -> ClientConfig {
        self.client_config(Duration::from_millis(self.download_timeout_ms))
    }

    fn client_config(&self, timeout: Duration) -> ClientConfig {
        ClientConfig {
            cookie: self.cookie.clone(),
            user_agent: self.user_agent.clone(),
            proxy: self.proxy.clone(),
            timeout,
        }
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_sec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let options = DownloadOptions::default();
        options.validate().unwrap();
        assert_eq!(options.filename_pattern, "{id}");
        assert_eq!(options.database_type, "SQLITE");
        assert_eq!(options.parse_parallel, 5);
        assert_eq!(options.download_parallel, 10);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
download_path = "mirror"
no_r18 = true
download_illust_ids = ["100", "200"]
"#
        )
        .unwrap();

        let options = DownloadOptions::load(Some(file.path())).unwrap();
        assert_eq!(options.download_path, PathBuf::from("mirror"));
        assert!(options.no_r18);
        assert_eq!(options.download_illust_ids, vec!["100", "200"]);
        // untouched values keep their defaults
        assert_eq!(options.scan_interval_sec, 3600);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let result = DownloadOptions::load(Some(Path::new("/nonexistent/pixiv.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let options = DownloadOptions {
            parse_parallel: 0,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn client_configs_use_per_pool_timeouts() {
        let options = DownloadOptions::default();
        assert_eq!(
            options.parse_client_config().timeout,
            Duration::from_millis(5_000)
        );
        assert_eq!(
            options.download_client_config().timeout,
            Duration::from_millis(600_000)
        );
    }
}
