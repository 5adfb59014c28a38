//! Bookmarks discovery stage
//!
//! Consumes user ids and paginates each user's bookmark list in fixed
//! chunks, emitting digests for works the catalog has not fully captured.
//! Pagination order is preserved within one user's scan; each page is
//! fully processed before the cursor advances.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{next_item, SharedReceiver, Stage, StageCounters};
use crate::app::catalog::IllustCatalog;
use crate::app::client::{PageCursor, RemoteSource};
use crate::app::filters::FilterSet;
use crate::app::models::{BookmarksPage, IllustDigest, UserId};
use crate::app::retry::{retry_catalog_op, Attempt, RetryPolicy};
use crate::constants::limits;
use crate::errors::{CatalogError, RemoteError};

/// Scans bookmark lists of the seeded user ids.
pub struct BookmarksStage {
    retry: RetryPolicy,
    filters: FilterSet,
    catalog: Arc<dyn IllustCatalog>,
    remote: Arc<dyn RemoteSource>,
    counters: StageCounters,
}

impl BookmarksStage {
    pub fn new(
        retry: RetryPolicy,
        filters: FilterSet,
        catalog: Arc<dyn IllustCatalog>,
        remote: Arc<dyn RemoteSource>,
    ) -> Arc<Self> {
        Arc::new(Self {
            retry,
            filters,
            catalog,
            remote,
            counters: StageCounters::default(),
        })
    }

    /// Spawn the single scan worker. Bookmark pagination is sequential
    /// per user, so one worker keeps page order deterministic.
    pub fn spawn(
        self: Arc<Self>,
        input: mpsc::Receiver<UserId>,
        output: mpsc::Sender<IllustDigest>,
    ) -> Vec<JoinHandle<()>> {
        let input: SharedReceiver<UserId> = Arc::new(tokio::sync::Mutex::new(input));
        vec![tokio::spawn(async move {
            while let Some(uid) = next_item(&input).await {
                self.process_user(&uid, &output).await;
                self.counters.add_consumed();
            }
            debug!("bookmarks worker exiting");
        })]
    }

    async fn process_user(&self, uid: &UserId, output: &mpsc::Sender<IllustDigest>) {
        let cursor = StdMutex::new(PageCursor::new(limits::BOOKMARKS_PAGE_LIMIT));
        let cursor = &cursor;
        loop {
            if !cursor.lock().unwrap().has_more() {
                info!(%uid, "finished bookmark scan");
                break;
            }
            self.retry
                .run(|| async move {
                    let (offset, limit) = {
                        let cursor = cursor.lock().unwrap();
                        (cursor.offset(), cursor.limit())
                    };
                    let page = match self.remote.bookmarks_page(uid, offset, limit).await {
                        Ok(page) => page,
                        Err(RemoteError::NotFound { .. }) => {
                            warn!(%uid, offset, "user gone, ending bookmark scan");
                            cursor.lock().unwrap().mark_exhausted();
                            return Attempt::Done;
                        }
                        Err(RemoteError::Decode { .. }) => {
                            warn!(%uid, offset, "skipping undecodable bookmarks page");
                            return Attempt::Done;
                        }
                        Err(error) => {
                            warn!(%uid, offset, %error, "bookmarks page fetch failed, will retry");
                            return Attempt::Retry;
                        }
                    };

                    cursor.lock().unwrap().record_total(page.total);
                    match self.emit_page(&page, output).await {
                        Ok(()) => {
                            info!(%uid, offset, total = page.total, "scanned bookmarks page");
                            Attempt::Done
                        }
                        Err(error) => {
                            warn!(%uid, offset, %error, "bookmarks page processing failed, will retry");
                            Attempt::Retry
                        }
                    }
                })
                .await;
            cursor.lock().unwrap().advance();
        }
    }

    /// Filter and forward one page of digests. A catalog error aborts the
    /// page so the retry harness re-runs it.
    async fn emit_page(
        &self,
        page: &BookmarksPage,
        output: &mpsc::Sender<IllustDigest>,
    ) -> Result<(), CatalogError> {
        for digest in &page.works {
            if !self.filters.keeps_user(&digest.user.user_id) {
                continue;
            }

            let captured = retry_catalog_op(|| self.catalog.is_fully_captured(&digest.id))
                .await
                .inspect_err(
                    |error| error!(illust = %digest.id, %error, "existence probe failed"),
                )?;
            if captured {
                debug!(illust = %digest.id, "already captured, skipping");
                continue;
            }

            info!("discovered bookmark {}", digest.digest_line());
            if output.send(digest.clone()).await.is_err() {
                break; // downstream closed during shutdown
            }
            self.counters.add_produced();
        }
        Ok(())
    }
}

impl Stage for BookmarksStage {
    fn name(&self) -> &'static str {
        "bookmarks"
    }

    fn counters(&self) -> &StageCounters {
        &self.counters
    }
}
