//! Map a user-supplied identifier to the platform's stable user ID.

use thiserror::Error;

use crate::api::{FetchError, TikTokApi};
use crate::state::{StateDb, StateError, UserLookup, UserRecord};

/// Identifiers at least this long are treated as sec UIDs rather than handles.
pub const SEC_UID_MIN_LEN: usize = 30;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Failed to resolve '{identifier}': {source}")]
    Remote {
        identifier: String,
        #[source]
        source: FetchError,
    },

    #[error("No user ID found for '{0}'")]
    NotFound(String),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Which local column a non-numeric identifier is matched against.
fn classify(identifier: &str) -> UserLookup {
    if identifier.chars().count() < SEC_UID_MIN_LEN {
        UserLookup::UniqueName
    } else {
        UserLookup::SecUid
    }
}

fn is_numeric_id(identifier: &str) -> bool {
    identifier.parse::<u64>().is_ok()
}

/// Stored user matching `identifier` by ID, handle or sec UID.
pub async fn find_local_user(
    db: &dyn StateDb,
    identifier: &str,
) -> Result<Option<UserRecord>, StateError> {
    let lookup = if is_numeric_id(identifier) {
        UserLookup::UserId
    } else {
        classify(identifier)
    };
    db.get_user(lookup, identifier).await
}

/// Resolve `identifier` to a user ID.
///
/// Numeric identifiers are returned as-is without touching the store or the
/// network. Otherwise the store is consulted first and the remote API second.
/// A remote answer is not written back to the store.
pub async fn resolve_user_id(
    api: &dyn TikTokApi,
    db: &dyn StateDb,
    identifier: &str,
) -> Result<String, ResolveError> {
    if is_numeric_id(identifier) {
        return Ok(identifier.to_string());
    }

    let lookup = classify(identifier);
    if let Some(user) = db.get_user(lookup, identifier).await? {
        tracing::debug!(identifier, user_id = %user.user_id, "Resolved from local store");
        return Ok(user.user_id);
    }

    let resolved = api
        .resolve_username(identifier)
        .await
        .map_err(|source| ResolveError::Remote {
            identifier: identifier.to_string(),
            source,
        })?;
    if resolved.user_id.is_empty() {
        return Err(ResolveError::NotFound(identifier.to_string()));
    }
    tracing::debug!(
        identifier,
        user_id = %resolved.user_id,
        sec_uid = %resolved.sec_uid,
        "Resolved via API"
    );
    Ok(resolved.user_id)
}
