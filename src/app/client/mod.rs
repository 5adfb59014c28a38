//! HTTP access layer for the remote illustration service
//!
//! [`PixivClient`] is a stateless GET facade: every method hides the wire
//! envelope and returns typed results classified into the three-kind
//! error taxonomy ([`RemoteError`]). The pipeline consumes it through the
//! [`RemoteSource`] trait so tests can substitute an in-memory remote.
//!
//! The module is organized into:
//! - `config`: client settings and reqwest construction
//! - `endpoints`: URL and Referer derivation
//! - `download`: streaming transfer with inline SHA-1

pub mod config;
pub mod download;
pub mod endpoints;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::REFERER;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

pub use config::ClientConfig;

use crate::app::models::{
    BookmarksPage, FollowingPage, IllustId, IllustRecord, UserAttribution, UserId,
};
use crate::errors::{ConfigError, RemoteError};

/// The remote operations the pipeline stages depend on.
///
/// All workers share one implementation read-only after construction.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// One page of a user's bookmarks.
    async fn bookmarks_page(
        &self,
        uid: &UserId,
        offset: i64,
        limit: i64,
    ) -> Result<BookmarksPage, RemoteError>;

    /// All published illustration ids of a user.
    async fn user_illust_ids(&self, uid: &UserId) -> Result<Vec<IllustId>, RemoteError>;

    /// Full metadata of a work, fanned out to one record per page.
    /// Returns a single record when `only_first_page` is set or the work
    /// has one page.
    async fn illust_records(
        &self,
        id: &IllustId,
        only_first_page: bool,
    ) -> Result<Vec<IllustRecord>, RemoteError>;

    /// Stream a binary asset to `target`, returning the byte count and
    /// the SHA-1 hex of the written stream. The caller guarantees the
    /// target directory exists.
    async fn download_to_file(
        &self,
        url: &str,
        target: &Path,
    ) -> Result<(u64, String), RemoteError>;
}

/// JSON envelope wrapping every ajax response.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    body: serde_json::Value,
}

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

fn one() -> u32 {
    1
}

/// Image URL variants attached to a work or page.
#[derive(Debug, Clone, Default, Deserialize)]
struct ImageUrls {
    #[serde(default)]
    original: String,
}

/// Wire shape of the illust detail endpoint. `tags` is the nested tag
/// envelope; the flat projection happens in [`PixivClient::illust_records`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IllustSeed {
    id: IllustId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    urls: ImageUrls,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default = "one")]
    page_count: u32,
    #[serde(default)]
    bookmark_count: u32,
    #[serde(default)]
    like_count: u32,
    #[serde(default)]
    comment_count: u32,
    #[serde(default)]
    view_count: u32,
    #[serde(default = "epoch")]
    create_date: DateTime<Utc>,
    #[serde(default = "epoch")]
    upload_date: DateTime<Utc>,
    #[serde(default)]
    user_id: UserId,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    user_account: String,
    #[serde(default)]
    tags: TagEnvelope,
}

#[derive(Debug, Default, Deserialize)]
struct TagEnvelope {
    #[serde(default)]
    tags: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    tag: String,
}

/// Wire shape of one entry of the pages endpoint.
#[derive(Debug, Deserialize)]
struct PageUnit {
    #[serde(default)]
    urls: ImageUrls,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

const R18_TAG: &str = "R-18";

/// Stateless HTTP client for the remote service.
#[derive(Debug)]
pub struct PixivClient {
    http: reqwest::Client,
}

impl PixivClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            http: config.build_http_client()?,
        })
    }

    async fn get_raw(&self, url: &str, referer: &str) -> Result<reqwest::Response, RemoteError> {
        let response = self
            .http
            .get(url)
            .header(REFERER, referer)
            .send()
            .await
            .map_err(RemoteError::transient)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound {
                url: url.to_string(),
            }),
            status if !status.is_success() => Err(RemoteError::transient(format!(
                "status {status} from {url}"
            ))),
            _ => Ok(response),
        }
    }

    /// GET an ajax endpoint and unwrap the response envelope.
    async fn get_body(&self, url: &str, referer: &str) -> Result<serde_json::Value, RemoteError> {
        let response = self.get_raw(url, referer).await?;
        let text = response.text().await.map_err(RemoteError::transient)?;
        let envelope: Envelope =
            serde_json::from_str(&text).map_err(|_| RemoteError::Decode {
                url: url.to_string(),
            })?;
        if envelope.error {
            return Err(RemoteError::transient(format!(
                "remote reported error for {url}: {}",
                envelope.message
            )));
        }
        debug!(%url, "fetched ajax body");
        Ok(envelope.body)
    }

    fn decode<T: serde::de::DeserializeOwned>(
        url: &str,
        body: serde_json::Value,
    ) -> Result<T, RemoteError> {
        serde_json::from_value(body).map_err(|_| RemoteError::Decode {
            url: url.to_string(),
        })
    }

    /// One page of the users a user follows. Exposed for the `info user`
    /// command; the pipeline itself does not scan following lists.
    pub async fn following_page(
        &self,
        uid: &UserId,
        offset: i64,
        limit: i64,
    ) -> Result<FollowingPage, RemoteError> {
        let url = endpoints::following_url(uid, offset, limit);
        let body = self.get_body(&url, &endpoints::following_referer(uid)).await?;
        Self::decode(&url, body)
    }

    fn record_from_seed(seed: IllustSeed) -> IllustRecord {
        let tags: Vec<String> = seed.tags.tags.into_iter().map(|entry| entry.tag).collect();
        let is_r18 = tags.iter().any(|tag| tag == R18_TAG);

        IllustRecord {
            id: seed.id,
            page_index: 0,
            title: seed.title,
            description: seed.description,
            tags,
            is_r18,
            url_original: seed.urls.original,
            width: seed.width,
            height: seed.height,
            page_count: seed.page_count,
            bookmark_count: seed.bookmark_count,
            like_count: seed.like_count,
            comment_count: seed.comment_count,
            view_count: seed.view_count,
            create_date: seed.create_date,
            upload_date: seed.upload_date,
            user: UserAttribution {
                user_id: seed.user_id,
                user_name: seed.user_name,
                user_account: seed.user_account,
            },
        }
    }
}

#[async_trait]
impl RemoteSource for PixivClient {
    async fn bookmarks_page(
        &self,
        uid: &UserId,
        offset: i64,
        limit: i64,
    ) -> Result<BookmarksPage, RemoteError> {
        let url = endpoints::bookmarks_url(uid, offset, limit);
        let body = self.get_body(&url, &endpoints::bookmarks_referer(uid)).await?;
        Self::decode(&url, body)
    }

    async fn user_illust_ids(&self, uid: &UserId) -> Result<Vec<IllustId>, RemoteError> {
        let url = endpoints::user_illusts_url(uid);
        let body = self.get_body(&url, &endpoints::user_referer(uid)).await?;

        // `illusts` is an object keyed by work id, or an empty array when
        // the user has published nothing.
        let illusts = body.get("illusts").cloned().unwrap_or_default();
        match illusts {
            serde_json::Value::Object(map) => {
                Ok(map.into_iter().map(|(key, _)| IllustId::from(key)).collect())
            }
            serde_json::Value::Array(entries) if entries.is_empty() => Ok(Vec::new()),
            serde_json::Value::Null => Ok(Vec::new()),
            _ => Err(RemoteError::Decode { url }),
        }
    }

    async fn illust_records(
        &self,
        id: &IllustId,
        only_first_page: bool,
    ) -> Result<Vec<IllustRecord>, RemoteError> {
        let url = endpoints::illust_url(id);
        let referer = endpoints::artwork_referer(id);
        let body = self.get_body(&url, &referer).await?;
        let seed: IllustSeed = Self::decode(&url, body)?;

        if seed.page_count == 1 || only_first_page {
            return Ok(vec![Self::record_from_seed(seed)]);
        }

        let pages_url = endpoints::illust_pages_url(id);
        let pages_body = self.get_body(&pages_url, &referer).await?;
        let pages: Vec<PageUnit> = Self::decode(&pages_url, pages_body)?;

        let template = Self::record_from_seed(seed);
        let total = pages.len() as u32;
        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(index, page)| {
                let mut record = template.clone();
                record.page_index = index as u32;
                record.page_count = total;
                record.url_original = page.urls.original;
                record.width = page.width;
                record.height = page.height;
                record
            })
            .collect())
    }

    async fn download_to_file(
        &self,
        url: &str,
        target: &Path,
    ) -> Result<(u64, String), RemoteError> {
        let response = self.get_raw(url, endpoints::DOWNLOAD_REFERER).await?;
        download::stream_to_file(response, target).await
    }
}

/// Cursor over a paginated listing with an initially unknown total.
///
/// `total == -1` means unknown: at least one fetch happens. Each page
/// response raises the recorded total monotonically; a NotFound response
/// marks the listing exhausted so the scan ends.
#[derive(Debug, Clone)]
pub struct PageCursor {
    offset: i64,
    total: i64,
    limit: i64,
}

impl PageCursor {
    pub fn new(limit: i64) -> Self {
        Self {
            offset: 0,
            total: -1,
            limit,
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn has_more(&self) -> bool {
        self.total == -1 || self.offset < self.total
    }

    pub fn advance(&mut self) {
        self.offset += self.limit;
    }

    /// Record a reported total; the cursor keeps the maximum seen.
    pub fn record_total(&mut self, total: i64) {
        if total > self.total {
            self.total = total;
        }
    }

    /// Mark the listing exhausted (the remote said the user is gone).
    pub fn mark_exhausted(&mut self) {
        self.total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_fetches_at_least_once_when_total_unknown() {
        let cursor = PageCursor::new(48);
        assert!(cursor.has_more());
        assert_eq!(cursor.offset(), 0);
    }

    #[test]
    fn cursor_ends_after_total_reached() {
        let mut cursor = PageCursor::new(48);
        cursor.record_total(50);
        cursor.advance();
        assert!(cursor.has_more()); // 48 < 50
        cursor.advance();
        assert!(!cursor.has_more()); // 96 >= 50
    }

    #[test]
    fn zero_total_after_first_page_ends_scan() {
        let mut cursor = PageCursor::new(48);
        cursor.record_total(0);
        assert!(!cursor.has_more());
    }

    #[test]
    fn recorded_total_is_monotone() {
        let mut cursor = PageCursor::new(48);
        cursor.record_total(100);
        cursor.record_total(0); // stale page reporting zero must not shrink
        assert_eq!(cursor.total, 100);
    }

    #[test]
    fn exhausted_cursor_has_no_more_pages() {
        let mut cursor = PageCursor::new(48);
        cursor.record_total(500);
        cursor.mark_exhausted();
        assert!(!cursor.has_more());
    }

    #[test]
    fn seed_with_r18_tag_marks_every_record() {
        let seed: IllustSeed = serde_json::from_value(serde_json::json!({
            "id": 77,
            "title": "t",
            "pageCount": 1,
            "urls": {"original": "https://i.example/77_p0.png"},
            "tags": {"tags": [{"tag": "R-18"}, {"tag": "scenery"}]}
        }))
        .unwrap();

        let record = PixivClient::record_from_seed(seed);
        assert!(record.is_r18);
        assert_eq!(record.tags, vec!["R-18", "scenery"]);
    }

    #[test]
    fn seed_decodes_with_missing_optionals() {
        let seed: IllustSeed = serde_json::from_value(serde_json::json!({
            "id": "5",
            "urls": {"original": ""}
        }))
        .unwrap();
        assert_eq!(seed.page_count, 1);
        assert_eq!(seed.create_date, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn envelope_decodes_error_flag() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"error": true, "message": "rate limited", "body": null}"#)
                .unwrap();
        assert!(envelope.error);
        assert_eq!(envelope.message, "rate limited");
    }
}
