//! State database trait and SQLite implementation.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::error::StateError;
use super::schema;
use super::types::{PostRecord, UserLookup, UserRecord, UserSummary, Watermark};
use crate::api::PostId;

/// Durable scraper state: users, per-post outcomes and per-user watermarks.
///
/// Every write is a single upsert keyed by primary key; there are no
/// multi-statement transactions. Object-safe so callers hold `&dyn StateDb`.
#[async_trait]
pub trait StateDb: Send + Sync {
    /// Insert a user, or on conflict by `user_id` update only `enabled`.
    async fn upsert_user(
        &self,
        user_id: &str,
        unique_name: Option<&str>,
        sec_uid: Option<&str>,
        enabled: bool,
    ) -> Result<(), StateError>;

    /// Absence is `Ok(None)`, never an error.
    async fn get_user(
        &self,
        lookup: UserLookup,
        value: &str,
    ) -> Result<Option<UserRecord>, StateError>;

    /// Insert a post outcome, or on conflict by `post_id` overwrite
    /// `downloaded` and `error`.
    async fn upsert_post(
        &self,
        post_id: PostId,
        user_id: &str,
        downloaded: bool,
        error: Option<&str>,
    ) -> Result<(), StateError>;

    /// Replace the user's single watermark row.
    async fn upsert_watermark(
        &self,
        user_id: &str,
        post_id: PostId,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StateError>;

    async fn get_watermark(&self, user_id: &str) -> Result<Option<Watermark>, StateError>;

    // ── Reporting ──

    /// All users, ordered by handle.
    async fn list_users(&self) -> Result<Vec<UserRecord>, StateError>;

    async fn list_enabled_users(&self) -> Result<Vec<UserRecord>, StateError>;

    async fn get_user_summary(&self, user_id: &str) -> Result<UserSummary, StateError>;

    /// Posts whose last attempt failed, newest first.
    async fn get_failed_posts(&self, user_id: &str) -> Result<Vec<PostRecord>, StateError>;
}

/// SQLite implementation of the state database.
pub struct SqliteStateDb {
    /// rusqlite::Connection is not Sync; the Mutex is the only locking layered
    /// on top of SQLite's own write serialization.
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl std::fmt::Debug for SqliteStateDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStateDb")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteStateDb {
    /// Open or create a database at the given path.
    pub async fn open(path: &Path) -> Result<Self, StateError> {
        let path = path.to_path_buf();
        let path_clone = path.clone();

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path_clone).map_err(|e| StateError::Open {
                path: path_clone.clone(),
                source: e,
            })?;
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(StateError::Migration)?;
            conn.pragma_update(None, "foreign_keys", true)
                .map_err(StateError::Migration)?;
            schema::migrate(&conn)?;
            Ok::<_, StateError>(conn)
        })
        .await??;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StateError> {
        let conn = Connection::open_in_memory().map_err(|e| StateError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StateError> {
        self.conn
            .lock()
            .map_err(|e| StateError::Query(e.to_string()))
    }

    #[cfg(test)]
    pub fn get_post(&self, post_id: PostId) -> Result<Option<PostRecord>, StateError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT post_id, user_id, downloaded, error FROM posts WHERE post_id = ?1",
                [post_id.to_string()],
                RawPost::from_row,
            )
            .optional()
            .map_err(StateError::query)?;
        row.map(RawPost::into_record).transpose()
    }

    fn query_users(&self, sql: &str) -> Result<Vec<UserRecord>, StateError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(sql).map_err(StateError::query)?;
        let users = stmt
            .query_map([], row_to_user)
            .map_err(StateError::query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StateError::query)?;
        Ok(users)
    }
}

#[async_trait]
impl StateDb for SqliteStateDb {
    async fn upsert_user(
        &self,
        user_id: &str,
        unique_name: Option<&str>,
        sec_uid: Option<&str>,
        enabled: bool,
    ) -> Result<(), StateError> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO users (user_id, unique_name, sec_uid, enabled)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                enabled = excluded.enabled
            "#,
            params![user_id, unique_name, sec_uid, enabled],
        )
        .map_err(StateError::query)?;
        Ok(())
    }

    async fn get_user(
        &self,
        lookup: UserLookup,
        value: &str,
    ) -> Result<Option<UserRecord>, StateError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT user_id, unique_name, sec_uid, enabled FROM users WHERE {} = ?1",
            lookup.column()
        );
        conn.query_row(&sql, [value], row_to_user)
            .optional()
            .map_err(StateError::query)
    }

    async fn upsert_post(
        &self,
        post_id: PostId,
        user_id: &str,
        downloaded: bool,
        error: Option<&str>,
    ) -> Result<(), StateError> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO posts (post_id, user_id, downloaded, error)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(post_id) DO UPDATE SET
                downloaded = excluded.downloaded,
                error = excluded.error
            "#,
            params![post_id.to_string(), user_id, downloaded, error],
        )
        .map_err(StateError::query)?;
        Ok(())
    }

    async fn upsert_watermark(
        &self,
        user_id: &str,
        post_id: PostId,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StateError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO last_scraped (user_id, post_id, timestamp) VALUES (?1, ?2, ?3)",
            params![user_id, post_id.to_string(), timestamp.timestamp()],
        )
        .map_err(StateError::query)?;
        Ok(())
    }

    async fn get_watermark(&self, user_id: &str) -> Result<Option<Watermark>, StateError> {
        let conn = self.lock()?;
        let row: Option<(String, String, i64)> = conn
            .query_row(
                "SELECT user_id, post_id, timestamp FROM last_scraped WHERE user_id = ?1 ORDER BY timestamp DESC LIMIT 1",
                [user_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(StateError::query)?;

        row.map(|(user_id, post_id, ts)| {
            Ok(Watermark {
                user_id,
                post_id: parse_post_id(&post_id)?,
                timestamp: Utc.timestamp_opt(ts, 0).single().ok_or_else(|| {
                    StateError::Corrupt {
                        column: "timestamp",
                        value: ts.to_string(),
                    }
                })?,
            })
        })
        .transpose()
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StateError> {
        self.query_users(
            "SELECT user_id, unique_name, sec_uid, enabled FROM users ORDER BY unique_name, user_id",
        )
    }

    async fn list_enabled_users(&self) -> Result<Vec<UserRecord>, StateError> {
        self.query_users(
            "SELECT user_id, unique_name, sec_uid, enabled FROM users WHERE enabled = 1 ORDER BY unique_name, user_id",
        )
    }

    async fn get_user_summary(&self, user_id: &str) -> Result<UserSummary, StateError> {
        let (downloaded, failed) = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT COALESCE(SUM(downloaded = 1), 0), COALESCE(SUM(downloaded = 0), 0) FROM posts WHERE user_id = ?1",
                [user_id],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .map_err(StateError::query)?
        };

        Ok(UserSummary {
            downloaded: downloaded as u64,
            failed: failed as u64,
            watermark: self.get_watermark(user_id).await?,
        })
    }

    async fn get_failed_posts(&self, user_id: &str) -> Result<Vec<PostRecord>, StateError> {
        let raw = {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare_cached(
                    "SELECT post_id, user_id, downloaded, error FROM posts WHERE user_id = ?1 AND downloaded = 0",
                )
                .map_err(StateError::query)?;
            let rows = stmt
                .query_map([user_id], RawPost::from_row)
                .map_err(StateError::query)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(StateError::query)?;
            rows
        };

        let mut records = raw
            .into_iter()
            .map(RawPost::into_record)
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by(|a, b| b.post_id.cmp(&a.post_id));
        Ok(records)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        user_id: row.get(0)?,
        unique_name: row.get(1)?,
        sec_uid: row.get(2)?,
        enabled: row.get(3)?,
    })
}

/// A `posts` row before its ID has been parsed.
struct RawPost {
    post_id: String,
    user_id: String,
    downloaded: bool,
    error: Option<String>,
}

impl RawPost {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            post_id: row.get(0)?,
            user_id: row.get(1)?,
            downloaded: row.get(2)?,
            error: row.get(3)?,
        })
    }

    fn into_record(self) -> Result<PostRecord, StateError> {
        Ok(PostRecord {
            post_id: parse_post_id(&self.post_id)?,
            user_id: self.user_id,
            downloaded: self.downloaded,
            error: self.error,
        })
    }
}

fn parse_post_id(raw: &str) -> Result<PostId, StateError> {
    raw.parse().map_err(|_| StateError::Corrupt {
        column: "post_id",
        value: raw.to_string(),
    })
}
