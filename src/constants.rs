//! Application constants for pixiv-mirror
//!
//! Centralizes endpoint bases, queue capacities, and retry defaults,
//! organized by functional domain.

use std::time::Duration;

/// Remote service URL bases.
pub mod remote {
    /// Base of all JSON ajax endpoints.
    pub const AJAX_BASE: &str = "https://www.pixiv.net/ajax";

    /// Base of the user-facing site, used to derive Referer headers.
    pub const WWW_BASE: &str = "https://www.pixiv.net";
}

/// HTTP client defaults.
pub mod http {
    /// Default User-Agent sent with every request, override via config.
    pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36";

    /// Connection establishment timeout.
    pub const CONNECT_TIMEOUT_MS: u64 = 10_000;
}

/// Bounded queue capacities between pipeline stages.
pub mod queues {
    /// User-id seed queue feeding a discovery stage.
    pub const UID_QUEUE_CAPACITY: usize = 10;

    /// Digest queue between discovery and the info stage.
    pub const DIGEST_QUEUE_CAPACITY: usize = 50;

    /// Record queue between the info and download stages.
    pub const RECORD_QUEUE_CAPACITY: usize = 100;
}

/// Retry and scan limits.
pub mod limits {
    use super::Duration;

    /// Bookmarks are scanned in fixed pages of this many works.
    pub const BOOKMARKS_PAGE_LIMIT: i64 = 48;

    /// Following lists are paginated with the same chunk size.
    pub const FOLLOWING_PAGE_LIMIT: i64 = 48;

    /// Attempts for the fixed-interval harness around catalog calls.
    pub const CATALOG_RETRY_ATTEMPTS: u32 = 3;

    /// Sleep between catalog retry attempts.
    pub const CATALOG_RETRY_INTERVAL: Duration = Duration::from_secs(1);

    /// Jittered backoff adds `U[0, backoff / JITTER_DIVISOR)` to each sleep.
    pub const BACKOFF_JITTER_DIVISOR: u64 = 10;
}

/// Orchestration timing.
pub mod orchestrator {
    use super::Duration;

    /// Interval between quiescence checks of the stage counters.
    pub const QUIESCENCE_POLL_INTERVAL: Duration = Duration::from_secs(1);
}
