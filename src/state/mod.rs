//! Persistent scraper state.
//!
//! Three tables back the incremental sync:
//! - `users`: known accounts and whether `sync-all` should visit them
//! - `posts`: outcome of the latest download attempt per post
//! - `last_scraped`: per-user watermark, the highest post ID already handled

pub mod db;
pub mod error;
pub mod schema;
pub mod types;

pub use db::{SqliteStateDb, StateDb};
pub use error::StateError;
pub use types::{UserLookup, UserRecord};
