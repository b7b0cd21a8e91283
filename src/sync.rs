//! Watermark-bounded pagination over a user's post listing.
//!
//! The listing is newest first, so once a page reaches the watermark every
//! later page is older still and the walk can stop. Nothing here writes to
//! the store; advancing the watermark is the download batch's job.

use futures_util::stream::{self, Stream, TryStreamExt};
use thiserror::Error;

use crate::api::{FetchError, Post, PostId, PostsPage, TikTokApi};
use crate::state::{StateDb, StateError};

/// Posts requested per listing call.
pub const PAGE_SIZE: u32 = 35;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// What one page contributes and where the walk goes next.
struct PageOutcome {
    items: Vec<Post>,
    /// `None` once the walk is finished.
    next_offset: Option<u64>,
}

fn apply_watermark(page: PostsPage, watermark: Option<PostId>) -> PageOutcome {
    if let Some(mark) = watermark {
        if page.items.iter().any(|post| post.id <= mark) {
            let items = page
                .items
                .into_iter()
                .filter(|post| post.id > mark)
                .collect();
            return PageOutcome {
                items,
                next_offset: None,
            };
        }
    }

    PageOutcome {
        next_offset: page.has_more.then_some(page.cursor),
        items: page.items,
    }
}

/// Lazily fetch pages of posts newer than `watermark`.
///
/// Each stream item is the surviving part of one page, in received order.
/// The stream ends on an empty page, on the page that reaches the watermark,
/// when the server reports no more pages, or when the returned cursor does not
/// move past the current offset. Starting it again with the same
/// arguments repeats the same walk.
pub fn new_post_pages<'a>(
    api: &'a dyn TikTokApi,
    user_id: &'a str,
    watermark: Option<PostId>,
) -> impl Stream<Item = Result<Vec<Post>, FetchError>> + 'a {
    stream::try_unfold(Some(0u64), move |offset| async move {
        let Some(offset) = offset else {
            return Ok(None);
        };

        tracing::debug!(user_id, offset, "Fetching posts page");
        let page = api.get_user_posts(user_id, PAGE_SIZE, offset).await?;
        if page.items.is_empty() {
            tracing::debug!(user_id, offset, "Empty page, stopping");
            return Ok(None);
        }

        let received = page.items.len();
        let mut outcome = apply_watermark(page, watermark);
        if let Some(next) = outcome.next_offset.filter(|next| *next <= offset) {
            tracing::warn!(
                user_id,
                offset,
                cursor = next,
                "Listing cursor did not advance, stopping"
            );
            outcome.next_offset = None;
        }
        tracing::debug!(
            user_id,
            received,
            kept = outcome.items.len(),
            next = ?outcome.next_offset,
            "Processed posts page"
        );
        Ok::<_, FetchError>(Some((outcome.items, outcome.next_offset)))
    })
}

/// Collect every post newer than the watermark for `user_id`.
///
/// `override_watermark` replaces the stored one when given.
pub async fn fetch_new_posts(
    api: &dyn TikTokApi,
    db: &dyn StateDb,
    user_id: &str,
    override_watermark: Option<PostId>,
) -> Result<Vec<Post>, SyncError> {
    let watermark = match override_watermark {
        Some(mark) => Some(mark),
        None => db.get_watermark(user_id).await?.map(|w| w.post_id),
    };
    match watermark {
        Some(mark) => tracing::info!("Fetching posts for {} newer than {}", user_id, mark),
        None => tracing::info!("Fetching all posts for {}", user_id),
    }

    let pages = new_post_pages(api, user_id, watermark);
    futures_util::pin_mut!(pages);

    let mut posts = Vec::new();
    while let Some(page) = pages.try_next().await? {
        posts.extend(page);
    }

    tracing::info!("Found {} new posts for {}", posts.len(), user_id);
    Ok(posts)
}
