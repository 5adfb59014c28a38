//! Info stage
//!
//! Consumes digests, fetches full metadata, and fans each work out to one
//! record per page. Works the remote reports gone are recorded as
//! NOT-FOUND sentinel rows so later rounds short-circuit on the
//! existence probe instead of refetching.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{next_item, SharedReceiver, Stage, StageCounters};
use crate::app::catalog::IllustCatalog;
use crate::app::client::RemoteSource;
use crate::app::filters::FilterSet;
use crate::app::models::{IllustDigest, IllustRecord};
use crate::app::retry::{retry_catalog_op, Attempt, RetryPolicy};
use crate::errors::RemoteError;

/// Fetches full metadata for discovered works.
pub struct InfoStage {
    pool_size: usize,
    only_first_page: bool,
    retry: RetryPolicy,
    filters: FilterSet,
    catalog: Arc<dyn IllustCatalog>,
    remote: Arc<dyn RemoteSource>,
    counters: StageCounters,
}

impl InfoStage {
    pub fn new(
        pool_size: usize,
        only_first_page: bool,
        retry: RetryPolicy,
        filters: FilterSet,
        catalog: Arc<dyn IllustCatalog>,
        remote: Arc<dyn RemoteSource>,
    ) -> Arc<Self> {
        Arc::new(Self {
            pool_size,
            only_first_page,
            retry,
            filters,
            catalog,
            remote,
            counters: StageCounters::default(),
        })
    }

    pub fn spawn(
        self: Arc<Self>,
        input: mpsc::Receiver<IllustDigest>,
        output: mpsc::Sender<IllustRecord>,
    ) -> Vec<JoinHandle<()>> {
        let input: SharedReceiver<IllustDigest> = Arc::new(tokio::sync::Mutex::new(input));
        (0..self.pool_size)
            .map(|worker| {
                let stage = Arc::clone(&self);
                let input = Arc::clone(&input);
                let output = output.clone();
                tokio::spawn(async move {
                    while let Some(digest) = next_item(&input).await {
                        stage.process_digest(&digest, &output).await;
                        stage.counters.add_consumed();
                    }
                    debug!(worker, "info worker exiting");
                })
            })
            .collect()
    }

    async fn process_digest(&self, digest: &IllustDigest, output: &mpsc::Sender<IllustRecord>) {
        self.retry
            .run(|| async move {
                match retry_catalog_op(|| self.catalog.is_fully_captured(&digest.id)).await {
                    Ok(true) => {
                        debug!(illust = %digest.id, "already captured, skipping");
                        return Attempt::Done;
                    }
                    Ok(false) => {}
                    Err(error) => {
                        error!(illust = %digest.id, %error, "existence probe failed, will retry");
                        return Attempt::Retry;
                    }
                }

                let records = match self
                    .remote
                    .illust_records(&digest.id, self.only_first_page)
                    .await
                {
                    Ok(records) => records,
                    Err(RemoteError::NotFound { .. }) => {
                        self.record_not_found(digest).await;
                        return Attempt::Done;
                    }
                    Err(RemoteError::Decode { .. }) => {
                        warn!(illust = %digest.id, "skipping undecodable work");
                        return Attempt::Done;
                    }
                    Err(error) => {
                        warn!(illust = %digest.id, %error, "info fetch failed, will retry");
                        return Attempt::Retry;
                    }
                };

                if let Some(first) = records.first() {
                    info!("fetched info {}", first.digest_line());
                }
                for record in records {
                    if !self.filters.keeps_record(&record) {
                        continue;
                    }
                    if output.send(record).await.is_err() {
                        return Attempt::Done; // downstream closed during shutdown
                    }
                    self.counters.add_produced();
                }
                Attempt::Done
            })
            .await;
    }

    /// Write the NOT-FOUND sentinel so future rounds skip this work.
    async fn record_not_found(&self, digest: &IllustDigest) {
        warn!(illust = %digest.id, "work gone, recording NOT-FOUND sentinel");
        let sentinel = IllustRecord::not_found_sentinel(digest.id.clone());
        if let Err(error) = retry_catalog_op(|| self.catalog.save(&sentinel, "", "")).await {
            error!(illust = %digest.id, %error, "failed to record NOT-FOUND sentinel");
        }
    }
}

impl Stage for InfoStage {
    fn name(&self) -> &'static str {
        "info"
    }

    fn counters(&self) -> &StageCounters {
        &self.counters
    }
}
