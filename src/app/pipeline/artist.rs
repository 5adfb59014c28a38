//! Artist discovery stage
//!
//! Consumes user ids and enumerates each user's complete published
//! catalog in a single call. Misses against the catalog are emitted as
//! synthetic digests carrying no attribution; operators narrow scope via
//! the seed uid list itself.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{next_item, SharedReceiver, Stage, StageCounters};
use crate::app::catalog::IllustCatalog;
use crate::app::client::RemoteSource;
use crate::app::models::{IllustDigest, UserId};
use crate::app::retry::{retry_catalog_op, Attempt, RetryPolicy};
use crate::errors::RemoteError;

/// Enumerates every published work of the seeded user ids.
pub struct ArtistStage {
    retry: RetryPolicy,
    catalog: Arc<dyn IllustCatalog>,
    remote: Arc<dyn RemoteSource>,
    counters: StageCounters,
}

impl ArtistStage {
    pub fn new(
        retry: RetryPolicy,
        catalog: Arc<dyn IllustCatalog>,
        remote: Arc<dyn RemoteSource>,
    ) -> Arc<Self> {
        Arc::new(Self {
            retry,
            catalog,
            remote,
            counters: StageCounters::default(),
        })
    }

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
            debug!("artist worker exiting");
        })]
    }

    async fn process_user(&self, uid: &UserId, output: &mpsc::Sender<IllustDigest>) {
        self.retry
            .run(|| async move {
                let ids = match self.remote.user_illust_ids(uid).await {
                    Ok(ids) => ids,
                    Err(RemoteError::NotFound { .. }) | Err(RemoteError::Decode { .. }) => {
                        warn!(%uid, "skipping artist, listing unavailable");
                        return Attempt::Done;
                    }
                    Err(error) => {
                        warn!(%uid, %error, "artist listing failed, will retry");
                        return Attempt::Retry;
                    }
                };

                info!(%uid, count = ids.len(), "listed published works");
                for id in &ids {
                    let captured =
                        match retry_catalog_op(|| self.catalog.is_fully_captured(id)).await {
                            Ok(captured) => captured,
                            Err(error) => {
                                error!(illust = %id, %error, "existence probe failed, will retry");
                                return Attempt::Retry;
                            }
                        };
                    if captured {
                        debug!(illust = %id, "already captured, skipping");
                        continue;
                    }

                    if output.send(IllustDigest::from_id(id.clone())).await.is_err() {
                        return Attempt::Done; // downstream closed during shutdown
                    }
                    self.counters.add_produced();
                }
                Attempt::Done
            })
            .await;
    }
}

impl Stage for ArtistStage {
    fn name(&self) -> &'static str {
        "artist"
    }

    fn counters(&self) -> &StageCounters {
        &self.counters
    }
}
