//! Download stage
//!
//! Consumes per-page records, streams each asset to disk, and persists
//! the catalog row with the hash of the written bytes. Existence-probe
//! failures are ignored here: downloading twice is cheaper than losing a
//! page to a flaky catalog.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{next_item, SharedReceiver, Stage, StageCounters};
use crate::app::catalog::IllustCatalog;
use crate::app::client::RemoteSource;
use crate::app::models::IllustRecord;
use crate::app::retry::{retry_catalog_op, Attempt, RetryPolicy};
use crate::errors::RemoteError;

/// Characters replaced by `_` in filename tokens.
const ILLEGAL_FILENAME_CHARS: [char; 10] = ['*', '"', '<', '>', '?', '\\', '|', '/', ':', ' '];

/// Replace every filesystem-hostile character with an underscore.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if ILLEGAL_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Build the stored filename for a record. The `{id}` token is the URL
/// basename minus its extension (which already encodes the page index);
/// `{title}` and `{user}` pass through the sanitizer. An empty pattern
/// keeps the URL basename untouched.
pub fn format_filename(record: &IllustRecord, pattern: &str) -> String {
    let basename = record
        .url_original
        .rsplit('/')
        .next()
        .unwrap_or(record.url_original.as_str());
    if pattern.is_empty() {
        return basename.to_string();
    }

    let (stem, extension) = match basename.rfind('.') {
        Some(dot) => basename.split_at(dot),
        None => (basename, ""),
    };

    let mut name = pattern.replace("{id}", stem);
    name = name.replace("{title}", &sanitize_file_name(&record.title));
    name = name.replace("{user_id}", record.user.user_id.as_str());
    name = name.replace("{user}", &sanitize_file_name(&record.user.user_name));
    name.push_str(extension);
    name
}

/// Streams assets to disk and persists catalog rows.
pub struct DownloadStage {
    pool_size: usize,
    download_path: PathBuf,
    filename_pattern: String,
    retry: RetryPolicy,
    catalog: Arc<dyn IllustCatalog>,
    remote: Arc<dyn RemoteSource>,
    counters: StageCounters,
}

impl DownloadStage {
    pub fn new(
        pool_size: usize,
        download_path: PathBuf,
        filename_pattern: String,
        retry: RetryPolicy,
        catalog: Arc<dyn IllustCatalog>,
        remote: Arc<dyn RemoteSource>,
    ) -> Arc<Self> {
        Arc::new(Self {
            pool_size,
            download_path,
            filename_pattern,
            retry,
            catalog,
            remote,
            counters: StageCounters::default(),
        })
    }

    pub fn spawn(self: Arc<Self>, input: mpsc::Receiver<IllustRecord>) -> Vec<JoinHandle<()>> {
        let input: SharedReceiver<IllustRecord> = Arc::new(tokio::sync::Mutex::new(input));
        (0..self.pool_size)
            .map(|worker| {
                let stage = Arc::clone(&self);
                let input = Arc::clone(&input);
                tokio::spawn(async move {
                    while let Some(record) = next_item(&input).await {
                        stage.process_record(&record).await;
                        stage.counters.add_consumed();
                    }
                    debug!(worker, "download worker exiting");
                })
            })
            .collect()
    }

    async fn process_record(&self, record: &IllustRecord) {
        if record.url_original.is_empty() {
            warn!("skipping record without original URL {}", record.digest_line());
            return;
        }

        let filename = format_filename(record, &self.filename_pattern);
        let full_path = self.download_path.join(&filename);
        let (filename, full_path) = (&filename, &full_path);

        self.retry
            .run(|| async move {
                match retry_catalog_op(|| self.catalog.page_exists(&record.id, record.page_index))
                    .await
                {
                    Ok(true) => {
                        debug!(illust = %record.id, page = record.page_index, "page already stored, skipping");
                        return Attempt::Done;
                    }
                    Ok(false) => {}
                    // Probe errors are ignored; the download proceeds.
                    Err(error) => {
                        warn!(illust = %record.id, %error, "existence probe failed, downloading anyway")
                    }
                }

                if let Some(parent) = full_path.parent() {
                    if let Err(error) = tokio::fs::create_dir_all(parent).await {
                        warn!(path = %parent.display(), %error, "failed to create download directory, will retry");
                        return Attempt::Retry;
                    }
                }

                let started = Instant::now();
                let (size, sha1_hex) = match self
                    .remote
                    .download_to_file(&record.url_original, full_path.as_path())
                    .await
                {
                    Ok(result) => result,
                    Err(RemoteError::NotFound { .. }) | Err(RemoteError::Decode { .. }) => {
                        warn!(illust = %record.id, page = record.page_index, "asset gone, skipping");
                        return Attempt::Done;
                    }
                    Err(error) => {
                        warn!(
                            illust = %record.id,
                            url = %record.url_original,
                            %error,
                            "download failed, will retry"
                        );
                        return Attempt::Retry;
                    }
                };

                if let Err(error) =
                    retry_catalog_op(|| self.catalog.save(record, &sha1_hex, filename.as_str()))
                        .await
                {
                    error!(illust = %record.id, %error, "failed to persist catalog row, will retry");
                    return Attempt::Retry;
                }

                self.counters.add_produced();
                info!(
                    illust = %record.id,
                    page = record.page_index,
                    file = %full_path.display(),
                    size,
                    elapsed = ?started.elapsed(),
                    "stored page"
                );
                Attempt::Done
            })
            .await;
    }
}

impl Stage for DownloadStage {
    fn name(&self) -> &'static str {
        "download"
    }

    fn counters(&self) -> &StageCounters {
        &self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{IllustId, IllustRecord};

    fn record_with(url: &str, title: &str, user_name: &str) -> IllustRecord {
        let mut record = IllustRecord::not_found_sentinel(IllustId::from("86000"));
        record.title = title.to_string();
        record.url_original = url.to_string();
        record.user.user_id = "42".into();
        record.user.user_name = user_name.to_string();
        record
    }

    #[test]
    fn sanitizer_replaces_every_illegal_char() {
        let sanitized = sanitize_file_name("a*b\"c<d>e?f\\g|h/i:j k");
        assert_eq!(sanitized, "a_b_c_d_e_f_g_h_i_j_k");
        for c in ILLEGAL_FILENAME_CHARS {
            assert!(!sanitized.contains(c));
        }
    }

    #[test]
    fn sanitizer_keeps_unicode() {
        assert_eq!(sanitize_file_name("さくら2023"), "さくら2023");
    }

    #[test]
    fn empty_pattern_keeps_url_basename() {
        let record = record_with("https://i.example/img/86000_p0.png", "t", "u");
        assert_eq!(format_filename(&record, ""), "86000_p0.png");
    }

    #[test]
    fn id_pattern_uses_basename_stem() {
        let record = record_with("https://i.example/img/86000_p0.png", "t", "u");
        assert_eq!(format_filename(&record, "{id}"), "86000_p0.png");
    }

    #[test]
    fn composite_pattern_substitutes_all_tokens() {
        let record = record_with(
            "https://i.example/img/86000_p2.jpg",
            "sky: dawn",
            "some artist",
        );
        assert_eq!(
            format_filename(&record, "{user_id}/{user}/{id}_{title}"),
            "42/some_artist/86000_p2_sky__dawn.jpg"
        );
    }

    #[test]
    fn basename_without_extension() {
        let record = record_with("https://i.example/img/raw86000", "t", "u");
        assert_eq!(format_filename(&record, "{id}"), "raw86000");
    }
}
