//! Core application logic
//!
//! Leaves first: data models, filters, and the retry harnesses; then the
//! catalog and the remote client; finally the staged pipeline that wires
//! them together.

pub mod catalog;
pub mod client;
pub mod filters;
pub mod models;
pub mod pipeline;
pub mod retry;

pub use catalog::{open_catalog, DatabaseKind, IllustCatalog, NullCatalog, SqliteCatalog};
pub use client::{ClientConfig, PageCursor, PixivClient, RemoteSource};
pub use filters::FilterSet;
pub use models::{
    BookmarksPage, FollowingPage, IllustDigest, IllustId, IllustRecord, UserAttribution, UserId,
};
pub use pipeline::{
    format_filename, sanitize_file_name, ArtistStage, BookmarksStage, DownloadStage, InfoStage,
    Pipeline, RoundStats, Stage, StageCounters,
};
pub use retry::{retry_catalog_op, retry_op, Attempt, RetryPolicy};
