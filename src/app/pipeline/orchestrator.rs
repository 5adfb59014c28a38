//! Pipeline assembly, seeding, and quiescence detection
//!
//! A [`Pipeline`] owns one topology: the two shared tail stages plus an
//! optional discovery head, wired by bounded queues. Workers are spawned
//! before any input is enqueued; a seeder task then feeds the head queue.
//!
//! A round is quiescent when every stage has consumed exactly what its
//! upstream produced, down from the seed count. The counters are monotone
//! within a round, so once the 1 Hz poll observes quiescence the
//! condition cannot un-detect; counters reset before the next round.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{ArtistStage, BookmarksStage, DownloadStage, InfoStage, Stage};
use crate::app::catalog::IllustCatalog;
use crate::app::client::RemoteSource;
use crate::app::filters::FilterSet;
use crate::app::models::{IllustDigest, IllustId, UserId};
use crate::config::DownloadOptions;
use crate::constants::{orchestrator, queues};
use crate::errors::{PipelineError, Result};

/// Inputs seeded into a topology each round.
enum Seeds {
    Users(Vec<UserId>),
    Illusts(Vec<IllustId>),
}

impl Seeds {
    fn len(&self) -> u64 {
        match self {
            Seeds::Users(uids) => uids.len() as u64,
            Seeds::Illusts(ids) => ids.len() as u64,
        }
    }
}

/// Counter snapshot of one completed round.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundStats {
    /// Inputs fed to the head queue.
    pub seeded: u64,
    /// Digests emitted by the discovery stage (equals `seeded` for the
    /// illusts topology).
    pub discovered: u64,
    /// Records emitted by the info stage.
    pub records: u64,
    /// Pages actually downloaded and persisted this round.
    pub stored: u64,
}

/// One wired topology: discovery (optional) -> info -> download.
pub struct Pipeline {
    seeds: Seeds,
    discovery: Option<Arc<dyn Stage>>,
    info_stage: Arc<InfoStage>,
    download_stage: Arc<DownloadStage>,
    /// Seed side of the uid queue; dropping it starts shutdown.
    uid_tx: Option<mpsc::Sender<UserId>>,
    /// Seed side of the digest queue, held only by the illusts topology.
    digest_tx: Option<mpsc::Sender<IllustDigest>>,
    handles: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Bookmarks topology: UIDs -> bookmarks scan -> info -> download.
    pub fn bookmarks(
        options: &DownloadOptions,
        catalog: Arc<dyn IllustCatalog>,
        parse_remote: Arc<dyn RemoteSource>,
        download_remote: Arc<dyn RemoteSource>,
        uids: Vec<UserId>,
    ) -> Self {
        let mut pipeline = Self::tail(options, &catalog, parse_remote.clone(), download_remote);
        let digest_tx = pipeline.digest_tx.take().expect("tail holds the digest sender");

        let (uid_tx, uid_rx) = mpsc::channel(queues::UID_QUEUE_CAPACITY);
        let stage = BookmarksStage::new(
            options.retry_policy(),
            FilterSet::from_options(options),
            catalog,
            parse_remote,
        );
        pipeline
            .handles
            .extend(Arc::clone(&stage).spawn(uid_rx, digest_tx));
        pipeline.discovery = Some(stage);
        pipeline.uid_tx = Some(uid_tx);
        pipeline.seeds = Seeds::Users(uids);
        pipeline
    }

    /// Artist topology: UIDs -> catalog enumeration -> info -> download.
    pub fn artists(
        options: &DownloadOptions,
        catalog: Arc<dyn IllustCatalog>,
        parse_remote: Arc<dyn RemoteSource>,
        download_remote: Arc<dyn RemoteSource>,
        uids: Vec<UserId>,
    ) -> Self {
        let mut pipeline = Self::tail(options, &catalog, parse_remote.clone(), download_remote);
        let digest_tx = pipeline.digest_tx.take().expect("tail holds the digest sender");

        let (uid_tx, uid_rx) = mpsc::channel(queues::UID_QUEUE_CAPACITY);
        let stage = ArtistStage::new(options.retry_policy(), catalog, parse_remote);
        pipeline
            .handles
            .extend(Arc::clone(&stage).spawn(uid_rx, digest_tx));
        pipeline.discovery = Some(stage);
        pipeline.uid_tx = Some(uid_tx);
        pipeline.seeds = Seeds::Users(uids);
        pipeline
    }

    /// Illusts topology: explicit work ids seeded straight into the info
    /// stage.
    pub fn illusts(
        options: &DownloadOptions,
        catalog: Arc<dyn IllustCatalog>,
        parse_remote: Arc<dyn RemoteSource>,
        download_remote: Arc<dyn RemoteSource>,
        ids: Vec<IllustId>,
    ) -> Self {
        let mut pipeline = Self::tail(options, &catalog, parse_remote, download_remote);
        pipeline.seeds = Seeds::Illusts(ids);
        pipeline
    }

    /// Build the two shared tail stages. The returned pipeline still
    /// holds the digest sender; discovery constructors take it over.
    fn tail(
        options: &DownloadOptions,
        catalog: &Arc<dyn IllustCatalog>,
        parse_remote: Arc<dyn RemoteSource>,
        download_remote: Arc<dyn RemoteSource>,
    ) -> Self {
        let (digest_tx, digest_rx) = mpsc::channel(queues::DIGEST_QUEUE_CAPACITY);
        let (record_tx, record_rx) = mpsc::channel(queues::RECORD_QUEUE_CAPACITY);

        let info_stage = InfoStage::new(
            options.parse_parallel,
            options.only_p0,
            options.retry_policy(),
            FilterSet::from_options(options),
            Arc::clone(catalog),
            parse_remote,
        );
        let download_stage = DownloadStage::new(
            options.download_parallel,
            options.download_path.clone(),
            options.filename_pattern.clone(),
            options.retry_policy(),
            Arc::clone(catalog),
            download_remote,
        );

        let mut handles = Vec::new();
        handles.extend(Arc::clone(&info_stage).spawn(digest_rx, record_tx));
        handles.extend(Arc::clone(&download_stage).spawn(record_rx));

        Self {
            seeds: Seeds::Illusts(Vec::new()),
            discovery: None,
            info_stage,
            download_stage,
            uid_tx: None,
            digest_tx: Some(digest_tx),
            handles,
        }
    }

    /// Feed this round's inputs into the head queue from a seeder task,
    /// so backpressure on the bounded queue never blocks the caller.
    fn seed_round(&mut self) -> u64 {
        let seeded = self.seeds.len();
        match &self.seeds {
            Seeds::Users(uids) => {
                let tx = self.uid_tx.clone().expect("user-seeded topology");
                let uids = uids.clone();
                self.handles.push(tokio::spawn(async move {
                    for uid in uids {
                        if tx.send(uid).await.is_err() {
                            break;
                        }
                    }
                }));
            }
            Seeds::Illusts(ids) => {
                let tx = self.digest_tx.clone().expect("illust-seeded topology");
                let ids = ids.clone();
                self.handles.push(tokio::spawn(async move {
                    for id in ids {
                        if tx.send(IllustDigest::from_id(id)).await.is_err() {
                            break;
                        }
                    }
                }));
            }
        }
        seeded
    }

    fn is_quiescent(&self, seeded: u64) -> bool {
        match &self.discovery {
            Some(discovery) => {
                discovery.consumed() == seeded
                    && self.info_stage.consumed() == discovery.produced()
                    && self.download_stage.consumed() == self.info_stage.produced()
            }
            None => {
                self.info_stage.consumed() == seeded
                    && self.download_stage.consumed() == self.info_stage.produced()
            }
        }
    }

    async fn wait_for_quiescence(&self, seeded: u64) {
        loop {
            if self.is_quiescent(seeded) {
                debug!(seeded, "round quiescent");
                return;
            }
            tokio::time::sleep(orchestrator::QUIESCENCE_POLL_INTERVAL).await;
        }
    }

    fn snapshot(&self, seeded: u64) -> RoundStats {
        RoundStats {
            seeded,
            discovered: self
                .discovery
                .as_ref()
                .map_or(seeded, |stage| stage.produced()),
            records: self.info_stage.produced(),
            stored: self.download_stage.produced(),
        }
    }

    fn reset_counters(&self) {
        if let Some(discovery) = &self.discovery {
            discovery.reset_counters();
        }
        self.info_stage.reset_counters();
        self.download_stage.reset_counters();
    }

    /// Run one scan round to quiescence. Counters reset afterwards so the
    /// pipeline can be driven again.
    pub async fn run_round(&mut self) -> RoundStats {
        let seeded = self.seed_round();
        self.wait_for_quiescence(seeded).await;
        let stats = self.snapshot(seeded);
        self.reset_counters();
        info!(
            seeded = stats.seeded,
            discovered = stats.discovered,
            records = stats.records,
            stored = stats.stored,
            "scan round complete"
        );
        stats
    }

    /// Close the seed queues and join every worker.
    pub async fn shutdown(mut self) -> Result<()> {
        self.uid_tx.take();
        self.digest_tx.take();
        for handle in self.handles.drain(..) {
            handle.await.map_err(PipelineError::from)?;
        }
        Ok(())
    }

    /// One-shot mode: a single round, then a clean shutdown.
    pub async fn run_once(mut self) -> Result<RoundStats> {
        let stats = self.run_round().await;
        self.shutdown().await?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::StageCounters;

    struct FakeStage(StageCounters);

    impl Stage for FakeStage {
        fn name(&self) -> &'static str {
            "fake"
        }
        fn counters(&self) -> &StageCounters {
            &self.0
        }
    }

    #[test]
    fn round_stats_default_is_zeroed() {
        let stats = RoundStats::default();
        assert_eq!(stats.seeded, 0);
        assert_eq!(stats.stored, 0);
    }

    #[test]
    fn stage_trait_counts_through_counters() {
        let stage = FakeStage(StageCounters::default());
        stage.counters().add_produced();
        stage.counters().add_consumed();
        assert_eq!(stage.produced(), 1);
        assert_eq!(stage.consumed(), 1);
        stage.reset_counters();
        assert_eq!(stage.produced(), 0);
    }
}
