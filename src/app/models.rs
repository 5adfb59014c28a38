//! Data models for pixiv-mirror
//!
//! Defines the identifier newtypes with their permissive JSON decoding,
//! the lightweight discovery digest, the full per-page record, and the
//! page envelopes returned by the remote listing endpoints.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{Deserializer, Error as DeError};
use serde::{Deserialize, Serialize, Serializer};

/// Decode an identifier leniently: the remote emits ids as JSON integers,
/// as plain strings, and occasionally as a JSON string containing another
/// quoted string. All three forms normalize to the same decimal string.
fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(number) => Ok(number.to_string()),
        serde_json::Value::String(text) => {
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(serde_json::Value::String(inner)) => Ok(inner),
                _ => Ok(text),
            }
        }
        other => Err(D::Error::custom(format!(
            "expected an id as integer or string, got {other}"
        ))),
    }
}

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                lenient_id(deserializer).map(Self)
            }
        }
    };
}

id_type! {
    /// Opaque identifier of one illustration ("work").
    IllustId
}

id_type! {
    /// Opaque identifier of one user. Same lenient decoding as
    /// [`IllustId`], distinct semantic namespace.
    UserId
}

/// Attribution fields shared by digests and records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAttribution {
    #[serde(default)]
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub user_account: String,
}

fn default_page_count() -> u32 {
    1
}

/// Minimal identifying metadata for a work, emitted by the discovery
/// stages and consumed by the info stage. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IllustDigest {
    pub id: IllustId,
    #[serde(default)]
    pub title: String,
    /// Page count as declared by the listing endpoint; the info fetch is
    /// authoritative.
    #[serde(default = "default_page_count")]
    pub page_count: u32,
    #[serde(flatten)]
    pub user: UserAttribution,
}

impl IllustDigest {
    /// Digest for an explicitly seeded or artist-enumerated work id. The
    /// empty attribution intentionally bypasses the by-user filter: scope
    /// was already chosen by the seed list.
    pub fn from_id(id: IllustId) -> Self {
        Self {
            id,
            title: String::new(),
            page_count: 1,
            user: UserAttribution::default(),
        }
    }

    /// One-line description for log records.
    pub fn digest_line(&self) -> String {
        format!(
            "[id: {}, title: {}, uid: {}, uname: {}, pages: {}]",
            self.id, self.title, self.user.user_id, self.user.user_name, self.page_count
        )
    }
}

/// Full metadata for one page of one work, produced by the info stage.
/// A subset of these fields is persisted as a catalog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IllustRecord {
    pub id: IllustId,
    pub page_index: u32,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub is_r18: bool,
    pub url_original: String,
    pub width: u32,
    pub height: u32,
    /// Total number of pages of the owning work.
    pub page_count: u32,
    pub bookmark_count: u32,
    pub like_count: u32,
    pub comment_count: u32,
    pub view_count: u32,
    pub create_date: DateTime<Utc>,
    pub upload_date: DateTime<Utc>,
    #[serde(flatten)]
    pub user: UserAttribution,
}

/// Title recorded for works the remote reports as gone.
pub const NOT_FOUND_TITLE: &str = "NOT FOUND";

impl IllustRecord {
    /// Sentinel row for a work the remote returned 404 for, written so
    /// subsequent scans short-circuit on the existence probe.
    pub fn not_found_sentinel(id: IllustId) -> Self {
        Self {
            id,
            page_index: 0,
            title: NOT_FOUND_TITLE.to_string(),
            description: String::new(),
            tags: Vec::new(),
            is_r18: false,
            url_original: String::new(),
            width: 0,
            height: 0,
            page_count: 1,
            bookmark_count: 0,
            like_count: 0,
            comment_count: 0,
            view_count: 0,
            create_date: DateTime::UNIX_EPOCH,
            upload_date: DateTime::UNIX_EPOCH,
            user: UserAttribution::default(),
        }
    }

    /// One-line description for log records.
    pub fn digest_line(&self) -> String {
        format!(
            "[id: {}, page: {}/{}, title: {}, uid: {}, r18: {}, bookmarks: {}, likes: {}]",
            self.id,
            self.page_index,
            self.page_count,
            self.title,
            self.user.user_id,
            self.is_r18,
            self.bookmark_count,
            self.like_count
        )
    }
}

/// One page of a user's bookmark list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookmarksPage {
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub works: Vec<IllustDigest>,
}

/// One page of a user's following list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowingPage {
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub users: Vec<UserAttribution>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_decode_normalizes_all_forms() {
        // Integer, plain string, and doubly-quoted string are equivalent.
        let from_int: IllustId = serde_json::from_str("12345").unwrap();
        let from_str: IllustId = serde_json::from_str("\"12345\"").unwrap();
        let from_nested: IllustId = serde_json::from_str("\"\\\"12345\\\"\"").unwrap();

        assert_eq!(from_int.as_str(), "12345");
        assert_eq!(from_int, from_str);
        assert_eq!(from_str, from_nested);
    }

    #[test]
    fn lenient_decode_keeps_non_numeric_strings() {
        let id: UserId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(id.as_str(), "abc");
    }

    #[test]
    fn lenient_decode_rejects_other_shapes() {
        assert!(serde_json::from_str::<IllustId>("[1]").is_err());
        assert!(serde_json::from_str::<IllustId>("{}").is_err());
    }

    #[test]
    fn ids_serialize_as_strings() {
        let id = IllustId::from("987");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"987\"");
    }

    #[test]
    fn digest_decodes_from_bookmark_entry() {
        let json = r#"{
            "id": 103612,
            "title": "spring",
            "pageCount": 2,
            "userId": 3494650,
            "userName": "hasune",
            "userAccount": "hasune_a"
        }"#;
        let digest: IllustDigest = serde_json::from_str(json).unwrap();

        assert_eq!(digest.id.as_str(), "103612");
        assert_eq!(digest.title, "spring");
        assert_eq!(digest.page_count, 2);
        assert_eq!(digest.user.user_id.as_str(), "3494650");
        assert_eq!(digest.user.user_account, "hasune_a");
    }

    #[test]
    fn digest_defaults_missing_fields() {
        let digest: IllustDigest = serde_json::from_str(r#"{"id": "7"}"#).unwrap();
        assert_eq!(digest.page_count, 1);
        assert!(digest.title.is_empty());
        assert!(digest.user.user_id.is_empty());
    }

    #[test]
    fn synthetic_digest_has_blank_attribution() {
        let digest = IllustDigest::from_id(IllustId::from("42"));
        assert_eq!(digest.page_count, 1);
        assert!(digest.user.user_id.is_empty());
    }

    #[test]
    fn not_found_sentinel_shape() {
        let sentinel = IllustRecord::not_found_sentinel(IllustId::from("404"));
        assert_eq!(sentinel.page_index, 0);
        assert_eq!(sentinel.page_count, 1);
        assert_eq!(sentinel.title, NOT_FOUND_TITLE);
        assert!(sentinel.url_original.is_empty());
    }
}
