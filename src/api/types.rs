//! Typed response bodies for the tokapi endpoints.
//!
//! Deserializing into these types is the validation boundary: a body that does
//! not match is rejected with [`FetchError::Invalid`](super::FetchError)
//! before anything reaches the sync or download code. Fields the scraper does
//! not interpret are kept in `extra` so batch snapshots preserve the payload.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Platform-assigned post ID.
///
/// The platform hands these out as decimal strings that increase with
/// creation time. They are compared numerically; comparing the strings would
/// misorder IDs of different digit lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PostId(u64);

impl PostId {
    #[cfg(test)]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
#[error("invalid post ID '{0}': expected a decimal number")]
pub struct ParsePostIdError(String);

impl FromStr for PostId {
    type Err = ParsePostIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(PostId)
            .map_err(|_| ParsePostIdError(s.to_string()))
    }
}

impl Serialize for PostId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PostId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Raw::Number(n) => Ok(PostId(n)),
        }
    }
}

/// Every tokapi body carries an application-level status; `0` means success.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    pub status_code: i64,
}

/// Wire shape of `GET /v1/post/user/{user_id}/posts`.
#[derive(Debug, Deserialize)]
pub(crate) struct PostsResponse {
    #[serde(default)]
    aweme_list: Option<Vec<Post>>,
    #[serde(default, deserialize_with = "flag")]
    has_more: bool,
    #[serde(default)]
    max_cursor: u64,
}

/// One page of a user's post listing, newest first.
#[derive(Debug, Clone, Default)]
pub struct PostsPage {
    pub items: Vec<Post>,
    pub has_more: bool,
    /// Offset to request the following page with.
    pub cursor: u64,
}

impl From<PostsResponse> for PostsPage {
    fn from(resp: PostsResponse) -> Self {
        Self {
            items: resp.aweme_list.unwrap_or_default(),
            has_more: resp.has_more,
            cursor: resp.max_cursor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "aweme_id")]
    pub id: PostId,
    pub author: Author,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Post {
    /// First playable URL, falling back to the download address.
    pub fn media_url(&self) -> Option<&str> {
        let video = self.video.as_ref()?;
        first_url(video.play_addr.as_ref()).or_else(|| first_url(video.download_addr.as_ref()))
    }
}

fn first_url(addr: Option<&UrlList>) -> Option<&str> {
    addr?
        .url_list
        .iter()
        .map(String::as_str)
        .find(|url| !url.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub uid: String,
    pub unique_id: String,
    pub sec_uid: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_addr: Option<UrlList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_addr: Option<UrlList>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlList {
    #[serde(default)]
    pub url_list: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Wire shape of `GET /v1/user/{user_id}`.
#[derive(Debug, Deserialize)]
pub(crate) struct UserResponse {
    pub user: UserProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub uid: String,
    pub unique_id: String,
    pub sec_uid: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub aweme_count: u64,
}

/// Wire shape of `GET /v1/user/username/{username}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolvedUser {
    #[serde(rename = "uid")]
    pub user_id: String,
    pub sec_uid: String,
}

/// `has_more` arrives as `0`/`1` from some API versions and as a bool from others.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => b,
        Raw::Int(n) => n != 0,
    })
}
