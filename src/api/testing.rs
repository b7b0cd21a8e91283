//! In-process stand-ins for the remote API used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use super::{FetchError, Post, PostsPage, ResolvedUser, TikTokApi, UserProfile};

pub(crate) const AUTHOR_UID: &str = "6800000000000000001";
pub(crate) const AUTHOR_SEC_UID: &str = "MS4wLjABAAAAtestsecuidtestsecuidtestsecuid";

/// Serves queued pages in order and records every call it receives.
#[derive(Default)]
pub(crate) struct FakeApi {
    pages: Mutex<VecDeque<Result<PostsPage, FetchError>>>,
    usernames: HashMap<String, Result<ResolvedUser, u16>>,
    pub(crate) offsets: Mutex<Vec<u64>>,
    pub(crate) resolve_calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub(crate) fn with_pages(pages: Vec<PostsPage>) -> Self {
        Self {
            pages: Mutex::new(pages.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    pub(crate) fn push_error(&self, err: FetchError) {
        self.pages.lock().unwrap().push_back(Err(err));
    }

    pub(crate) fn with_username(mut self, username: &str, user_id: &str) -> Self {
        self.usernames.insert(
            username.to_string(),
            Ok(ResolvedUser {
                user_id: user_id.to_string(),
                sec_uid: AUTHOR_SEC_UID.to_string(),
            }),
        );
        self
    }

    pub(crate) fn with_username_error(mut self, username: &str, status: u16) -> Self {
        self.usernames.insert(username.to_string(), Err(status));
        self
    }

    pub(crate) fn offsets(&self) -> Vec<u64> {
        self.offsets.lock().unwrap().clone()
    }

    pub(crate) fn resolve_calls(&self) -> Vec<String> {
        self.resolve_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TikTokApi for FakeApi {
    async fn get_user_posts(
        &self,
        _user_id: &str,
        _count: u32,
        offset: u64,
    ) -> Result<PostsPage, FetchError> {
        self.offsets.lock().unwrap().push(offset);
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(PostsPage::default()))
    }

    async fn get_user_info(&self, user_id: &str) -> Result<UserProfile, FetchError> {
        Ok(serde_json::from_value(json!({
            "uid": user_id,
            "unique_id": "alice",
            "sec_uid": AUTHOR_SEC_UID,
        }))
        .unwrap())
    }

    async fn resolve_username(&self, username: &str) -> Result<ResolvedUser, FetchError> {
        self.resolve_calls.lock().unwrap().push(username.to_string());
        match self.usernames.get(username) {
            Some(Ok(user)) => Ok(user.clone()),
            Some(Err(status)) => Err(FetchError::HttpStatus {
                endpoint: format!("/v1/user/username/{}", username),
                status: *status,
            }),
            None => Err(FetchError::HttpStatus {
                endpoint: format!("/v1/user/username/{}", username),
                status: 404,
            }),
        }
    }
}

/// A post by `unique_id` whose video plays from `urls`.
pub(crate) fn post_with_urls(id: u64, unique_id: &str, urls: &[String]) -> Post {
    serde_json::from_value(json!({
        "aweme_id": id.to_string(),
        "desc": format!("post {id}"),
        "author": {"uid": AUTHOR_UID, "unique_id": unique_id, "sec_uid": AUTHOR_SEC_UID},
        "video": {"play_addr": {"url_list": urls}},
    }))
    .unwrap()
}

pub(crate) fn post(id: u64) -> Post {
    post_with_urls(id, "alice", &[format!("https://cdn.example.com/{id}.mp4")])
}

pub(crate) fn post_without_video(id: u64, unique_id: &str) -> Post {
    serde_json::from_value(json!({
        "aweme_id": id.to_string(),
        "author": {"uid": AUTHOR_UID, "unique_id": unique_id, "sec_uid": AUTHOR_SEC_UID},
    }))
    .unwrap()
}

pub(crate) fn page(ids: &[u64], has_more: bool, cursor: u64) -> PostsPage {
    PostsPage {
        items: ids.iter().map(|&id| post(id)).collect(),
        has_more,
        cursor,
    }
}
