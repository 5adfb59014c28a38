//! Endpoint and Referer URL construction
//!
//! Every ajax request carries a Referer derived from the matching
//! user-facing page; the image hosts additionally require the site root
//! as Referer.

use url::Url;

use crate::app::models::{IllustId, UserId};
use crate::constants::remote;

/// Referer sent with binary image downloads.
pub const DOWNLOAD_REFERER: &str = remote::WWW_BASE;

fn paged(base: String, offset: i64, limit: i64) -> String {
    let mut url = Url::parse(&base).expect("endpoint base must be a valid URL");
    url.query_pairs_mut()
        .append_pair("tag", "")
        .append_pair("offset", &offset.to_string())
        .append_pair("limit", &limit.to_string())
        .append_pair("rest", "show");
    url.to_string()
}

pub fn bookmarks_url(uid: &UserId, offset: i64, limit: i64) -> String {
    paged(
        format!("{}/user/{}/illusts/bookmarks", remote::AJAX_BASE, uid),
        offset,
        limit,
    )
}

pub fn bookmarks_referer(uid: &UserId) -> String {
    format!("{}/users/{}/bookmarks/artworks", remote::WWW_BASE, uid)
}

pub fn following_url(uid: &UserId, offset: i64, limit: i64) -> String {
    paged(
        format!("{}/user/{}/following", remote::AJAX_BASE, uid),
        offset,
        limit,
    )
}

pub fn following_referer(uid: &UserId) -> String {
    format!("{}/users/{}/following", remote::WWW_BASE, uid)
}

pub fn user_illusts_url(uid: &UserId) -> String {
    format!("{}/user/{}/profile/all", remote::AJAX_BASE, uid)
}

pub fn user_referer(uid: &UserId) -> String {
    format!("{}/users/{}", remote::WWW_BASE, uid)
}

pub fn illust_url(id: &IllustId) -> String {
    format!("{}/illust/{}", remote::AJAX_BASE, id)
}

pub fn illust_pages_url(id: &IllustId) -> String {
    format!("{}/illust/{}/pages", remote::AJAX_BASE, id)
}

pub fn artwork_referer(id: &IllustId) -> String {
    format!("{}/artworks/{}", remote::WWW_BASE, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bookmarks_url_carries_cursor_params() {
        let url = bookmarks_url(&UserId::from("123"), 96, 48);
        assert_eq!(
            url,
            "https://www.pixiv.net/ajax/user/123/illusts/bookmarks?tag=&offset=96&limit=48&rest=show"
        );
    }

    #[test]
    fn following_url_carries_cursor_params() {
        let url = following_url(&UserId::from("9"), 0, 48);
        assert_eq!(
            url,
            "https://www.pixiv.net/ajax/user/9/following?tag=&offset=0&limit=48&rest=show"
        );
    }

    #[test]
    fn illust_urls() {
        let id = IllustId::from("555");
        assert_eq!(illust_url(&id), "https://www.pixiv.net/ajax/illust/555");
        assert_eq!(
            illust_pages_url(&id),
            "https://www.pixiv.net/ajax/illust/555/pages"
        );
        assert_eq!(artwork_referer(&id), "https://www.pixiv.net/artworks/555");
    }

    #[test]
    fn user_urls() {
        let uid = UserId::from("42");
        assert_eq!(
            user_illusts_url(&uid),
            "https://www.pixiv.net/ajax/user/42/profile/all"
        );
        assert_eq!(user_referer(&uid), "https://www.pixiv.net/users/42");
        assert_eq!(
            bookmarks_referer(&uid),
            "https://www.pixiv.net/users/42/bookmarks/artworks"
        );
    }
}
