use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::api::PostId;

/// On-disk layout under an installation root.
///
/// ```text
/// <root>/data/db.sqlite3
/// <root>/data/users/<unique_name>/videos/<post_id>.mp4
/// <root>/data/users/<unique_name>/json/posts-<epoch_ms>.json
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    data_dir: PathBuf,
}

impl Layout {
    pub fn new(root: &Path) -> Self {
        Self {
            data_dir: root.join("data"),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("db.sqlite3")
    }

    pub fn user_dir(&self, unique_name: &str) -> PathBuf {
        self.data_dir.join("users").join(clean_filename(unique_name))
    }

    pub fn video_path(&self, unique_name: &str, post_id: PostId) -> PathBuf {
        self.user_dir(unique_name)
            .join("videos")
            .join(format!("{}.mp4", post_id))
    }

    pub fn snapshot_path(&self, unique_name: &str, at: DateTime<Utc>) -> PathBuf {
        self.user_dir(unique_name)
            .join("json")
            .join(format!("posts-{}.json", at.timestamp_millis()))
    }
}

/// Sibling temp file a download streams into before being renamed.
pub fn part_path(download_path: &Path) -> PathBuf {
    let mut name = download_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    download_path.with_file_name(name)
}

/// Strip characters that are invalid on common filesystems: `/`, `\`, `:`,
/// `*`, `?`, `"`, `<`, `>`, `|`. Names that would resolve to the directory
/// itself or its parent become `_`.
pub fn clean_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
