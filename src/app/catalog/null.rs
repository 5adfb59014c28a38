//! Catalog implementation that persists nothing
//!
//! Used when `database_type = NONE`: every probe reports a miss, so the
//! pipeline re-fetches and re-downloads unconditionally.

use async_trait::async_trait;

use super::IllustCatalog;
use crate::app::models::{IllustId, IllustRecord};
use crate::errors::CatalogError;

/// The no-op catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCatalog;

#[async_trait]
impl IllustCatalog for NullCatalog {
    async fn page_exists(&self, _id: &IllustId, _page: u32) -> Result<bool, CatalogError> {
        Ok(false)
    }

    async fn is_fully_captured(&self, _id: &IllustId) -> Result<bool, CatalogError> {
        Ok(false)
    }

    async fn save(
        &self,
        _record: &IllustRecord,
        _sha1_hex: &str,
        _stored_filename: &str,
    ) -> Result<(), CatalogError> {
        Ok(())
    }

    async fn get(&self, _id: &IllustId, _page: u32) -> Result<Option<IllustRecord>, CatalogError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_catalog_never_reports_existing_work() {
        let catalog = NullCatalog;
        let id = IllustId::from("1");
        let record = IllustRecord::not_found_sentinel(id.clone());

        catalog.save(&record, "", "").await.unwrap();

        assert!(!catalog.page_exists(&id, 0).await.unwrap());
        assert!(!catalog.is_fully_captured(&id).await.unwrap());
        assert!(catalog.get(&id, 0).await.unwrap().is_none());
    }
}
