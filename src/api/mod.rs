//! Remote platform capability.
//!
//! The sync and download code only sees [`TikTokApi`]; [`RapidApiClient`] is
//! the production implementation against the RapidAPI-hosted tokapi service.

mod client;
pub mod error;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;

pub use client::{RapidApiClient, DEFAULT_API_URL};
pub use error::FetchError;
pub use types::{Author, Post, PostId, PostsPage, ResolvedUser, UserProfile};

use async_trait::async_trait;

#[async_trait]
pub trait TikTokApi: Send + Sync {
    /// One page of `user_id`'s posts, newest first, starting at `offset`.
    async fn get_user_posts(
        &self,
        user_id: &str,
        count: u32,
        offset: u64,
    ) -> Result<PostsPage, FetchError>;

    async fn get_user_info(&self, user_id: &str) -> Result<UserProfile, FetchError>;

    /// Map a username (or sec UID) to the stable user ID.
    async fn resolve_username(&self, username: &str) -> Result<ResolvedUser, FetchError>;
}
