//! Pure predicates deciding which discovered works survive each stage
//!
//! A [`FilterSet`] is built once from the options at orchestrator start
//! and shared read-only by all workers. The user filter runs on digests
//! before the info fetch; the record filter runs on full records before
//! the download queue.

use std::collections::HashSet;

use tracing::debug;

use crate::app::models::{IllustRecord, UserId};
use crate::config::DownloadOptions;

/// Side-effect-free filters over user ids and per-work attributes.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    user_white_list: HashSet<UserId>,
    user_block_list: HashSet<UserId>,
    no_r18: bool,
    only_first_page: bool,
    bookmark_gt: u32,
    like_gt: u32,
    pixel_gt: u32,
}

impl FilterSet {
    pub fn from_options(options: &DownloadOptions) -> Self {
        Self {
            user_white_list: options
                .user_white_list
                .iter()
                .map(|uid| UserId::from(uid.as_str()))
                .collect(),
            user_block_list: options
                .user_block_list
                .iter()
                .map(|uid| UserId::from(uid.as_str()))
                .collect(),
            no_r18: options.no_r18,
            only_first_page: options.only_p0,
            bookmark_gt: options.bookmark_gt,
            like_gt: options.like_gt,
            pixel_gt: options.pixel_gt,
        }
    }

    /// True when a digest attributed to `user_id` should proceed. An empty
    /// user id is always kept; it marks seeds whose scope was chosen
    /// upstream.
    pub fn keeps_user(&self, user_id: &UserId) -> bool {
        if user_id.is_empty() {
            return true;
        }
        if !self.user_white_list.is_empty() && !self.user_white_list.contains(user_id) {
            debug!(%user_id, "dropped by user white list");
            return false;
        }
        if !self.user_block_list.is_empty() && self.user_block_list.contains(user_id) {
            debug!(%user_id, "dropped by user block list");
            return false;
        }
        true
    }

    /// True when a full record should be queued for download. A zero
    /// count or dimension means "unknown" and never causes a drop on its
    /// own.
    pub fn keeps_record(&self, record: &IllustRecord) -> bool {
        if self.no_r18 && record.is_r18 {
            debug!(illust = %record.id, "dropped R-18 record");
            return false;
        }
        if self.only_first_page && record.page_index > 0 {
            debug!(illust = %record.id, page = record.page_index, "dropped non-first page");
            return false;
        }
        if self.bookmark_gt > 0
            && record.bookmark_count > 0
            && record.bookmark_count < self.bookmark_gt
        {
            debug!(illust = %record.id, bookmarks = record.bookmark_count, "dropped by bookmark count");
            return false;
        }
        if self.like_gt > 0 && record.like_count > 0 && record.like_count < self.like_gt {
            debug!(illust = %record.id, likes = record.like_count, "dropped by like count");
            return false;
        }
        if self.pixel_gt > 0
            && record.width > 0
            && record.height > 0
            && record.width < self.pixel_gt
            && record.height < self.pixel_gt
        {
            debug!(illust = %record.id, width = record.width, height = record.height, "dropped by pixel size");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::IllustId;

    fn record() -> IllustRecord {
        let mut record = IllustRecord::not_found_sentinel(IllustId::from("1"));
        record.title = "work".to_string();
        record.url_original = "https://i.example/1_p0.png".to_string();
        record
    }

    fn options_with(f: impl FnOnce(&mut DownloadOptions)) -> FilterSet {
        let mut options = DownloadOptions::default();
        f(&mut options);
        FilterSet::from_options(&options)
    }

    #[test]
    fn empty_filters_keep_everything() {
        let filters = FilterSet::default();
        assert!(filters.keeps_user(&UserId::from("99")));
        assert!(filters.keeps_record(&record()));
    }

    #[test]
    fn white_list_drops_other_users() {
        let filters = options_with(|o| o.user_white_list = vec!["UA".to_string()]);
        assert!(filters.keeps_user(&UserId::from("UA")));
        assert!(!filters.keeps_user(&UserId::from("UB")));
    }

    #[test]
    fn block_list_drops_listed_users() {
        let filters = options_with(|o| o.user_block_list = vec!["UB".to_string()]);
        assert!(filters.keeps_user(&UserId::from("UA")));
        assert!(!filters.keeps_user(&UserId::from("UB")));
    }

    #[test]
    fn block_list_applies_after_white_list() {
        let filters = options_with(|o| {
            o.user_white_list = vec!["UA".to_string()];
            o.user_block_list = vec!["UA".to_string()];
        });
        assert!(!filters.keeps_user(&UserId::from("UA")));
    }

    #[test]
    fn empty_user_id_always_kept() {
        // Artist-stage digests carry no attribution and must pass even
        // under a restrictive white list.
        let filters = options_with(|o| o.user_white_list = vec!["UA".to_string()]);
        assert!(filters.keeps_user(&UserId::default()));
    }

    #[test]
    fn r18_filter() {
        let filters = options_with(|o| o.no_r18 = true);
        let mut r18 = record();
        r18.is_r18 = true;
        assert!(!filters.keeps_record(&r18));
        assert!(filters.keeps_record(&record()));
    }

    #[test]
    fn only_first_page_filter() {
        let filters = options_with(|o| o.only_p0 = true);
        let mut later_page = record();
        later_page.page_index = 2;
        assert!(!filters.keeps_record(&later_page));
        assert!(filters.keeps_record(&record()));
    }

    #[test]
    fn count_thresholds_treat_zero_as_unknown() {
        let filters = options_with(|o| {
            o.bookmark_gt = 100;
            o.like_gt = 50;
        });

        let unknown = record(); // all counts zero
        assert!(filters.keeps_record(&unknown));

        let mut below = record();
        below.bookmark_count = 10;
        assert!(!filters.keeps_record(&below));

        let mut above = record();
        above.bookmark_count = 200;
        above.like_count = 60;
        assert!(filters.keeps_record(&above));
    }

    #[test]
    fn pixel_threshold_requires_both_dimensions_small() {
        let filters = options_with(|o| o.pixel_gt = 1000);

        let mut small = record();
        small.width = 500;
        small.height = 500;
        assert!(!filters.keeps_record(&small));

        let mut tall = record();
        tall.width = 500;
        tall.height = 2000;
        assert!(filters.keeps_record(&tall));

        let unknown = record(); // 0x0
        assert!(filters.keeps_record(&unknown));
    }
}
