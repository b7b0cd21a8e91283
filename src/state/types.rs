//! Row types for the state database.

use chrono::{DateTime, Utc};

use crate::api::PostId;

/// Which identity column a user lookup matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserLookup {
    UserId,
    UniqueName,
    SecUid,
}

impl UserLookup {
    pub(crate) fn column(self) -> &'static str {
        match self {
            UserLookup::UserId => "user_id",
            UserLookup::UniqueName => "unique_name",
            UserLookup::SecUid => "sec_uid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: String,
    pub unique_name: Option<String>,
    pub sec_uid: Option<String>,
    pub enabled: bool,
}

impl UserRecord {
    /// Handle for display, falling back to the numeric ID.
    pub fn display_name(&self) -> &str {
        self.unique_name.as_deref().unwrap_or(&self.user_id)
    }
}

/// Outcome of the most recent download attempt for a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub post_id: PostId,
    pub user_id: String,
    pub downloaded: bool,
    pub error: Option<String>,
}

/// Highest post ID already considered for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub user_id: String,
    pub post_id: PostId,
    pub timestamp: DateTime<Utc>,
}

/// Per-user counts shown by the `status` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSummary {
    pub downloaded: u64,
    pub failed: u64,
    pub watermark: Option<Watermark>,
}
