//! Convenience re-exports for typical library usage.

pub use crate::app::{
    open_catalog, IllustCatalog, IllustDigest, IllustId, IllustRecord, NullCatalog, Pipeline,
    PixivClient, RemoteSource, RoundStats, SqliteCatalog, UserId,
};
pub use crate::config::DownloadOptions;
pub use crate::errors::{AppError, RemoteError, Result};
