//! pixiv-mirror library
//!
//! A long-running ingestion pipeline that discovers illustration ids on
//! Pixiv, fetches per-work metadata, downloads the binary assets, and
//! records every captured page in an indexed catalog so later runs never
//! re-download finished work.
//!
//! # Architecture
//!
//! The pipeline is a DAG of stages connected by bounded queues, each
//! stage a pool of workers with monotone progress counters:
//!
//! ```text
//! illusts:    IDs ──────────────────────► [info] ──► [download]
//! bookmarks:  UIDs ──► [bookmarks scan] ─► [info] ──► [download]
//! artist:     UIDs ──► [artist listing] ─► [info] ──► [download]
//! ```
//!
//! The orchestrator seeds a round, waits for the counters to agree that
//! every in-flight unit has drained (quiescence), and in service mode
//! repeats on an interval. The catalog's existence probes short-circuit
//! work at every stage, which is what makes rounds idempotent.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pixiv_mirror::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let options = DownloadOptions::default();
//!     let catalog = open_catalog(&options).await?;
//!     let parse: Arc<dyn RemoteSource> =
//!         Arc::new(PixivClient::new(&options.parse_client_config())?);
//!     let download: Arc<dyn RemoteSource> =
//!         Arc::new(PixivClient::new(&options.download_client_config())?);
//!
//!     let pipeline = Pipeline::illusts(
//!         &options,
//!         catalog,
//!         parse,
//!         download,
//!         vec![IllustId::from("100")],
//!     );
//!     let stats = pipeline.run_once().await?;
//!     println!("stored {} pages", stats.stored);
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Public for the binary, intentionally not re-exported below.
pub mod cli;

pub use errors::{AppError, CatalogError, ConfigError, PipelineError, RemoteError, Result};

pub use app::{
    open_catalog, ArtistStage, BookmarksStage, ClientConfig, DatabaseKind, DownloadStage,
    FilterSet, IllustCatalog, IllustDigest, IllustId, IllustRecord, InfoStage, NullCatalog,
    PageCursor, Pipeline, PixivClient, RemoteSource, RetryPolicy, RoundStats, SqliteCatalog,
    Stage, UserAttribution, UserId,
};

pub use config::DownloadOptions;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn public_api_is_reachable() {
        let options = DownloadOptions::default();
        let _filters = FilterSet::from_options(&options);
        let _policy = options.retry_policy();
        let _catalog = NullCatalog;
        assert_eq!(
            "SQLITE".parse::<DatabaseKind>().unwrap(),
            DatabaseKind::Sqlite
        );
    }
}
