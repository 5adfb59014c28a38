//! SQLite-backed catalog
//!
//! One table, composite primary key `(work_id, page_index)`. The tag list
//! is serialized as a JSON array in a text column; the upsert replaces the
//! whole row and stamps both timestamps with the store's clock.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;

use super::IllustCatalog;
use crate::app::models::{IllustId, IllustRecord, UserAttribution};
use crate::errors::CatalogError;

const DB_FILE_NAME: &str = "pixiv.db";

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS illust (
    work_id          TEXT    NOT NULL,
    page_index       INTEGER NOT NULL DEFAULT 0,
    title            TEXT    NOT NULL DEFAULT '',
    url_original     TEXT    NOT NULL,
    is_r18           INTEGER NOT NULL DEFAULT 0,
    tags             TEXT,
    description      TEXT,
    width            INTEGER NOT NULL DEFAULT 0,
    height           INTEGER NOT NULL DEFAULT 0,
    total_page_count INTEGER NOT NULL DEFAULT 1,
    bookmark_count   INTEGER NOT NULL DEFAULT 0,
    like_count       INTEGER NOT NULL DEFAULT 0,
    comment_count    INTEGER NOT NULL DEFAULT 0,
    view_count       INTEGER NOT NULL DEFAULT 0,
    create_date      DATETIME NOT NULL DEFAULT '1970-01-01',
    upload_date      DATETIME NOT NULL DEFAULT '1970-01-01',
    user_id          TEXT    NOT NULL DEFAULT '',
    user_name        TEXT    NOT NULL DEFAULT '',
    user_account     TEXT    NOT NULL DEFAULT '',
    sha1_hex         TEXT    NOT NULL,
    stored_filename  TEXT    NOT NULL,
    created_at       DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at       DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (work_id, page_index)
)
"#;

const SAVE_SQL: &str = r#"
REPLACE INTO illust (
    work_id, page_index, title, url_original, is_r18, tags, description,
    width, height, total_page_count, bookmark_count, like_count,
    comment_count, view_count, create_date, upload_date,
    user_id, user_name, user_account, sha1_hex, stored_filename,
    created_at, updated_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
          CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
"#;

const GET_SQL: &str = r#"
SELECT work_id, page_index, title, url_original, is_r18, tags, description,
       width, height, total_page_count, bookmark_count, like_count,
       comment_count, view_count, create_date, upload_date,
       user_id, user_name, user_account
FROM illust WHERE work_id = ? AND page_index = ?
"#;

/// Catalog stored in a local SQLite file, WAL journal mode.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    /// Open (creating if needed) the catalog under `dir`.
    pub async fn open(dir: &Path) -> Result<Self, CatalogError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| CatalogError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;

        let db_path = dir.join(DB_FILE_NAME);
        let connect = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(connect)
            .await?;

        sqlx::query(CREATE_TABLE_SQL).execute(&pool).await?;
        info!(path = %db_path.display(), "opened sqlite catalog");

        Ok(Self { pool })
    }
}

#[async_trait]
impl IllustCatalog for SqliteCatalog {
    async fn page_exists(&self, id: &IllustId, page: u32) -> Result<bool, CatalogError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM illust WHERE work_id = ? AND page_index = ?",
        )
        .bind(id.as_str())
        .bind(page as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn is_fully_captured(&self, id: &IllustId) -> Result<bool, CatalogError> {
        let (count, max_pages): (i64, Option<i64>) = sqlx::query_as(
            "SELECT COUNT(1), MAX(total_page_count) FROM illust WHERE work_id = ?",
        )
        .bind(id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0 && Some(count) == max_pages)
    }

    async fn save(
        &self,
        record: &IllustRecord,
        sha1_hex: &str,
        stored_filename: &str,
    ) -> Result<(), CatalogError> {
        let tags = serde_json::to_string(&record.tags)?;
        sqlx::query(SAVE_SQL)
            .bind(record.id.as_str())
            .bind(record.page_index as i64)
            .bind(&record.title)
            .bind(&record.url_original)
            .bind(record.is_r18)
            .bind(tags)
            .bind(&record.description)
            .bind(record.width as i64)
            .bind(record.height as i64)
            .bind(record.page_count as i64)
            .bind(record.bookmark_count as i64)
            .bind(record.like_count as i64)
            .bind(record.comment_count as i64)
            .bind(record.view_count as i64)
            .bind(record.create_date)
            .bind(record.upload_date)
            .bind(record.user.user_id.as_str())
            .bind(&record.user.user_name)
            .bind(&record.user.user_account)
            .bind(sha1_hex)
            .bind(stored_filename)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, id: &IllustId, page: u32) -> Result<Option<IllustRecord>, CatalogError> {
        let row = sqlx::query(GET_SQL)
            .bind(id.as_str())
            .bind(page as i64)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tags: Option<String> = row.try_get("tags")?;
        let tags = tags
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?
            .unwrap_or_default();

        Ok(Some(IllustRecord {
            id: IllustId::from(row.try_get::<String, _>("work_id")?),
            page_index: row.try_get::<i64, _>("page_index")? as u32,
            title: row.try_get("title")?,
            url_original: row.try_get("url_original")?,
            is_r18: row.try_get("is_r18")?,
            tags,
            description: row
                .try_get::<Option<String>, _>("description")?
                .unwrap_or_default(),
            width: row.try_get::<i64, _>("width")? as u32,
            height: row.try_get::<i64, _>("height")? as u32,
            page_count: row.try_get::<i64, _>("total_page_count")? as u32,
            bookmark_count: row.try_get::<i64, _>("bookmark_count")? as u32,
            like_count: row.try_get::<i64, _>("like_count")? as u32,
            comment_count: row.try_get::<i64, _>("comment_count")? as u32,
            view_count: row.try_get::<i64, _>("view_count")? as u32,
            create_date: row.try_get("create_date")?,
            upload_date: row.try_get("upload_date")?,
            user: UserAttribution {
                user_id: crate::app::models::UserId::from(row.try_get::<String, _>("user_id")?),
                user_name: row.try_get("user_name")?,
                user_account: row.try_get("user_account")?,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use crate::app::models::UserId;

    async fn open_temp() -> (SqliteCatalog, TempDir) {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(dir.path()).await.unwrap();
        (catalog, dir)
    }

    fn sample_record(id: &str, page: u32, total: u32) -> IllustRecord {
        IllustRecord {
            id: IllustId::from(id),
            page_index: page,
            title: "flower garden".to_string(),
            description: "desc".to_string(),
            tags: vec!["original".to_string(), "scenery".to_string()],
            is_r18: false,
            url_original: format!("https://i.example/img/{id}_p{page}.png"),
            width: 1200,
            height: 900,
            page_count: total,
            bookmark_count: 12,
            like_count: 8,
            comment_count: 1,
            view_count: 300,
            create_date: Utc.with_ymd_and_hms(2023, 4, 1, 12, 0, 0).unwrap(),
            upload_date: Utc.with_ymd_and_hms(2023, 4, 1, 12, 5, 0).unwrap(),
            user: UserAttribution {
                user_id: UserId::from("777"),
                user_name: "artist".to_string(),
                user_account: "artist_a".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn save_then_get_roundtrips_persisted_fields() {
        let (catalog, _dir) = open_temp().await;
        let record = sample_record("100", 0, 1);

        catalog.save(&record, "abc123", "100_p0.png").await.unwrap();
        let loaded = catalog.get(&record.id, 0).await.unwrap().unwrap();

        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn get_missing_row_returns_none() {
        let (catalog, _dir) = open_temp().await;
        assert!(catalog
            .get(&IllustId::from("nope"), 0)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn upsert_keeps_a_single_row_per_page() {
        let (catalog, _dir) = open_temp().await;
        let mut record = sample_record("100", 0, 1);

        catalog.save(&record, "aaa", "first.png").await.unwrap();
        record.title = "renamed".to_string();
        catalog.save(&record, "bbb", "second.png").await.unwrap();

        let loaded = catalog.get(&record.id, 0).await.unwrap().unwrap();
        assert_eq!(loaded.title, "renamed");

        // Still exactly one row for the key.
        assert!(catalog.page_exists(&record.id, 0).await.unwrap());
        assert!(catalog.is_fully_captured(&record.id).await.unwrap());
    }

    #[tokio::test]
    async fn fully_captured_requires_all_pages() {
        let (catalog, _dir) = open_temp().await;
        let id = IllustId::from("200");

        assert!(!catalog.is_fully_captured(&id).await.unwrap());

        catalog
            .save(&sample_record("200", 0, 3), "h0", "200_p0.png")
            .await
            .unwrap();
        catalog
            .save(&sample_record("200", 1, 3), "h1", "200_p1.png")
            .await
            .unwrap();
        assert!(!catalog.is_fully_captured(&id).await.unwrap());

        catalog
            .save(&sample_record("200", 2, 3), "h2", "200_p2.png")
            .await
            .unwrap();
        assert!(catalog.is_fully_captured(&id).await.unwrap());
    }

    #[tokio::test]
    async fn page_exists_distinguishes_pages() {
        let (catalog, _dir) = open_temp().await;
        catalog
            .save(&sample_record("300", 1, 2), "h", "300_p1.png")
            .await
            .unwrap();

        assert!(catalog.page_exists(&IllustId::from("300"), 1).await.unwrap());
        assert!(!catalog.page_exists(&IllustId::from("300"), 0).await.unwrap());
    }

    #[tokio::test]
    async fn not_found_sentinel_counts_as_fully_captured() {
        let (catalog, _dir) = open_temp().await;
        let sentinel = IllustRecord::not_found_sentinel(IllustId::from("404"));

        catalog.save(&sentinel, "", "").await.unwrap();

        assert!(catalog.is_fully_captured(&sentinel.id).await.unwrap());
        let loaded = catalog.get(&sentinel.id, 0).await.unwrap().unwrap();
        assert_eq!(loaded.title, crate::app::models::NOT_FOUND_TITLE);
        assert!(loaded.url_original.is_empty());
    }

    #[tokio::test]
    async fn reopening_keeps_rows() {
        let dir = TempDir::new().unwrap();
        {
            let catalog = SqliteCatalog::open(dir.path()).await.unwrap();
            catalog
                .save(&sample_record("500", 0, 1), "h", "500_p0.png")
                .await
                .unwrap();
        }
        let catalog = SqliteCatalog::open(dir.path()).await.unwrap();
        assert!(catalog.page_exists(&IllustId::from("500"), 0).await.unwrap());
    }
}
