//! Error types for pixiv-mirror
//!
//! Each component has its own error enum; the pipeline cares almost
//! exclusively about [`RemoteError`], whose three variants drive the
//! retry/skip disposition of every stage. [`AppError`] is the top-level
//! umbrella used by the CLI.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the remote access layer.
///
/// This is the full taxonomy the pipeline dispatches on:
///
/// * [`RemoteError::NotFound`] - skip the unit, never retry. The info stage
///   additionally records a NOT-FOUND sentinel in the catalog.
/// * [`RemoteError::Decode`] - skip the unit, never retry.
/// * [`RemoteError::Transient`] - retry under the stage retry policy.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Remote returned HTTP 404 for the requested resource.
    #[error("remote returned 404: {url}")]
    NotFound { url: String },

    /// Response body did not parse into the expected shape.
    #[error("failed to decode response body from {url}")]
    Decode { url: String },

    /// Connect failure, non-2xx status, timeout, or read error.
    #[error("transient request failure: {message}")]
    Transient { message: String },
}

impl RemoteError {
    /// Build a transient error from anything displayable.
    pub fn transient(message: impl ToString) -> Self {
        Self::Transient {
            message: message.to_string(),
        }
    }

    /// True when the pipeline should retry the failed unit.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        Self::transient(error)
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(error: std::io::Error) -> Self {
        Self::transient(error)
    }
}

/// Catalog (persistence) errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Driver-level failure.
    #[error("catalog database error")]
    Database(#[from] sqlx::Error),

    /// Tag list could not be serialized into its JSON column.
    #[error("failed to encode tag list")]
    TagEncoding(#[from] serde_json::Error),

    /// The catalog directory could not be created.
    #[error("failed to create catalog directory: {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unknown `database_type` value in the configuration.
    #[error("unsupported database type '{value}', expected NONE or SQLITE")]
    UnsupportedKind { value: String },
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The named config file could not be read.
    #[error("failed to read config file: {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for the options surface.
    #[error("invalid config file")]
    Parse(#[from] toml::de::Error),

    /// A single option holds a value the pipeline cannot run with.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Orchestration errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A stage worker task panicked or was cancelled.
    #[error("stage worker terminated abnormally")]
    WorkerPanic(#[from] tokio::task::JoinError),
}

/// Top-level application error.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias for application-level fallible operations.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        let not_found = RemoteError::NotFound {
            url: "https://example.com/a".to_string(),
        };
        let decode = RemoteError::Decode {
            url: "https://example.com/b".to_string(),
        };
        let transient = RemoteError::transient("connection reset");

        assert!(!not_found.is_retryable());
        assert!(!decode.is_retryable());
        assert!(transient.is_retryable());
    }

    #[test]
    fn io_errors_map_to_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let remote: RemoteError = io.into();
        assert!(remote.is_retryable());
    }
}
