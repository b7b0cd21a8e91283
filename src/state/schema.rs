//! Database schema definitions and migrations.

use rusqlite::Connection;

use super::error::StateError;

/// Current schema version. Increment when making schema changes.
pub const SCHEMA_VERSION: i32 = 2;

/// Post IDs are stored as the platform's decimal strings; ordering happens
/// in Rust on the parsed value.
///
/// The bundled SQLite enforces foreign keys. `posts` and `last_scraped`
/// reference `users`, which is always written first. `last_scraped.post_id`
/// has no reference to `posts`: the watermark may name a post that was
/// skipped and so never got a row.
const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id TEXT NOT NULL PRIMARY KEY,
    unique_name TEXT UNIQUE,
    sec_uid TEXT UNIQUE,
    enabled INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS posts (
    post_id TEXT NOT NULL PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users (user_id),
    downloaded INTEGER NOT NULL DEFAULT 1,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_posts_user_id ON posts(user_id);

CREATE TABLE IF NOT EXISTS last_scraped (
    user_id TEXT NOT NULL PRIMARY KEY REFERENCES users (user_id),
    post_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);
"#;

/// Version 1 databases declared `last_scraped.post_id REFERENCES posts`.
/// Rebuild the table without it, keeping existing watermarks.
const MIGRATE_V1_TO_V2: &str = r#"
CREATE TABLE last_scraped_v2 (
    user_id TEXT NOT NULL PRIMARY KEY REFERENCES users (user_id),
    post_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);
INSERT INTO last_scraped_v2 (user_id, post_id, timestamp)
    SELECT user_id, post_id, timestamp FROM last_scraped;
DROP TABLE last_scraped;
ALTER TABLE last_scraped_v2 RENAME TO last_scraped;
"#;

pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32, StateError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StateError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Initialize or migrate the database schema. Idempotent.
pub(crate) fn migrate(conn: &Connection) -> Result<(), StateError> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(StateError::UnsupportedSchemaVersion {
            found: current_version,
            expected: SCHEMA_VERSION,
        });
    }

    if current_version == 0 {
        conn.execute_batch(SCHEMA_V1)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
        tracing::debug!("Initialized database schema at version {}", SCHEMA_VERSION);
    } else if current_version == 1 {
        conn.execute_batch(&format!("BEGIN;{}COMMIT;", MIGRATE_V1_TO_V2))?;
        set_schema_version(conn, SCHEMA_VERSION)?;
        tracing::info!("Migrated database schema from version 1 to {}", SCHEMA_VERSION);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_db_migration() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_idempotent_migration() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_unsupported_version() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        assert!(matches!(
            migrate(&conn),
            Err(StateError::UnsupportedSchemaVersion { .. })
        ));
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        for table in ["users", "posts", "last_scraped"] {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                .unwrap();
            assert_eq!(count, 0, "{table} should start empty");
        }
    }

    #[test]
    fn test_watermark_may_name_post_without_row() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", true).unwrap();
        migrate(&conn).unwrap();
        conn.execute("INSERT INTO users (user_id) VALUES ('1')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO last_scraped (user_id, post_id, timestamp) VALUES ('1', '100', 0)",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_user_reference_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", true).unwrap();
        migrate(&conn).unwrap();
        let orphan = conn.execute(
            "INSERT INTO posts (post_id, user_id) VALUES ('100', 'nobody')",
            [],
        );
        assert!(orphan.is_err());
    }

    #[test]
    fn test_v1_database_migrated_keeping_watermarks() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", true).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE users (
                user_id TEXT NOT NULL PRIMARY KEY,
                unique_name TEXT UNIQUE,
                sec_uid TEXT UNIQUE,
                enabled INTEGER NOT NULL DEFAULT 1
            );
            CREATE TABLE posts (
                post_id TEXT NOT NULL PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users (user_id),
                downloaded INTEGER NOT NULL DEFAULT 1,
                error TEXT
            );
            CREATE TABLE last_scraped (
                user_id TEXT NOT NULL PRIMARY KEY REFERENCES users (user_id),
                post_id TEXT NOT NULL REFERENCES posts (post_id),
                timestamp INTEGER NOT NULL
            );
            INSERT INTO users (user_id) VALUES ('1');
            INSERT INTO posts (post_id, user_id) VALUES ('90', '1');
            INSERT INTO last_scraped (user_id, post_id, timestamp) VALUES ('1', '90', 7);
            PRAGMA user_version = 1;
            "#,
        )
        .unwrap();

        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let kept: String = conn
            .query_row("SELECT post_id FROM last_scraped WHERE user_id = '1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(kept, "90");
        conn.execute(
            "INSERT OR REPLACE INTO last_scraped (user_id, post_id, timestamp) VALUES ('1', '100', 8)",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_unique_name_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO users (user_id, unique_name) VALUES ('1', 'alice')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO users (user_id, unique_name) VALUES ('2', 'alice')",
            [],
        );
        assert!(dup.is_err());
    }
}
