//! Durable index of captured illustration pages
//!
//! The catalog maps `(work_id, page_index)` to the persisted metadata of
//! one downloaded page. Its existence probes are what make repeated runs
//! idempotent: every stage short-circuits work the catalog already holds.
//!
//! Two implementations exist behind the [`IllustCatalog`] trait: a null
//! catalog that disables short-circuiting entirely, and a SQLite catalog
//! backed by sqlx. Stages never branch on the presence of a catalog.

mod null;
mod sqlite;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

pub use null::NullCatalog;
pub use sqlite::SqliteCatalog;

use crate::app::models::{IllustId, IllustRecord};
use crate::config::DownloadOptions;
use crate::errors::CatalogError;

/// Persistent mapping `(work_id, page_index) -> catalog row`.
///
/// All operations must be safe for concurrent callers; every stage worker
/// holds a shared handle.
#[async_trait]
pub trait IllustCatalog: Send + Sync {
    /// True iff a row with the composite key exists.
    async fn page_exists(&self, id: &IllustId, page: u32) -> Result<bool, CatalogError>;

    /// True iff the work has at least one row and the row count equals
    /// the largest `page_count` recorded for it.
    async fn is_fully_captured(&self, id: &IllustId) -> Result<bool, CatalogError>;

    /// Upsert keyed on `(work_id, page_index)`, replacing all mutable
    /// columns and stamping both timestamps.
    async fn save(
        &self,
        record: &IllustRecord,
        sha1_hex: &str,
        stored_filename: &str,
    ) -> Result<(), CatalogError>;

    /// Rehydrate the persisted fields of one page into a record.
    async fn get(&self, id: &IllustId, page: u32) -> Result<Option<IllustRecord>, CatalogError>;
}

/// Which catalog backend to run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    /// No persistence: probes always miss, saves are dropped.
    None,
    /// Local SQLite file.
    Sqlite,
}

impl FromStr for DatabaseKind {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "NONE" => Ok(Self::None),
            "SQLITE" => Ok(Self::Sqlite),
            _ => Err(CatalogError::UnsupportedKind {
                value: value.to_string(),
            }),
        }
    }
}

/// Open the catalog selected by the options.
pub async fn open_catalog(
    options: &DownloadOptions,
) -> Result<Arc<dyn IllustCatalog>, CatalogError> {
    match options.database_type.parse::<DatabaseKind>()? {
        DatabaseKind::None => Ok(Arc::new(NullCatalog)),
        DatabaseKind::Sqlite => Ok(Arc::new(SqliteCatalog::open(&options.sqlite_path).await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_kind_parses_case_insensitively() {
        assert_eq!("NONE".parse::<DatabaseKind>().unwrap(), DatabaseKind::None);
        assert_eq!(
            "sqlite".parse::<DatabaseKind>().unwrap(),
            DatabaseKind::Sqlite
        );
        assert!("MYSQL".parse::<DatabaseKind>().is_err());
    }
}
