//! The staged concurrent download pipeline
//!
//! Stages are pools of tokio tasks connected by bounded mpsc queues. A
//! pool shares its input receiver behind a mutex: whichever worker takes
//! the lock first claims the next unit. Queue elements transfer ownership
//! at the channel boundary, and a stage's output closes automatically
//! when its last worker exits, which is how shutdown cascades.
//!
//! Each stage keeps monotone `produced`/`consumed` counters; the
//! orchestrator compares them across stages to detect quiescence between
//! scan rounds.

pub mod artist;
pub mod bookmarks;
pub mod download;
pub mod info;
pub mod orchestrator;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

pub use artist::ArtistStage;
pub use bookmarks::BookmarksStage;
pub use download::{format_filename, sanitize_file_name, DownloadStage};
pub use info::InfoStage;
pub use orchestrator::{Pipeline, RoundStats};

/// Receiver end of a stage input queue, shared by the pool's workers.
pub type SharedReceiver<T> = Arc<Mutex<mpsc::Receiver<T>>>;

/// Claim the next unit from a shared input queue. Returns `None` once the
/// queue is closed and drained, which tells the worker to exit.
pub async fn next_item<T>(input: &SharedReceiver<T>) -> Option<T> {
    input.lock().await.recv().await
}

/// Monotone per-stage progress counters.
///
/// `produced` counts units emitted downstream, `consumed` counts units
/// taken from the input queue and fully handled (including abandoned
/// ones). Both only grow within a round; readers use acquire loads so a
/// quiescence decision, once true, stays true until reset.
#[derive(Debug, Default)]
pub struct StageCounters {
    produced: AtomicU64,
    consumed: AtomicU64,
}

impl StageCounters {
    pub fn add_produced(&self) {
        self.produced.fetch_add(1, Ordering::AcqRel);
    }

    pub fn add_consumed(&self) {
        self.consumed.fetch_add(1, Ordering::AcqRel);
    }

    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Acquire)
    }

    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Acquire)
    }

    /// Zero both counters for the next round.
    pub fn reset(&self) {
        self.produced.store(0, Ordering::Release);
        self.consumed.store(0, Ordering::Release);
    }
}

/// Common surface of one pipeline stage.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn counters(&self) -> &StageCounters;

    fn produced(&self) -> u64 {
        self.counters().produced()
    }

    fn consumed(&self) -> u64 {
        self.counters().consumed()
    }

    fn reset_counters(&self) {
        self.counters().reset()
    }
}
