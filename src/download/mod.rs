//! Download orchestration for one sync batch.
//!
//! Posts are handled one at a time. A post that cannot be downloaded is
//! recorded as failed and the batch keeps going; only storage faults and a
//! failed snapshot write abort it, and in that case the watermark is left
//! where it was so the next run starts from the same place.

pub mod error;
pub mod file;
pub mod paths;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;

use crate::api::{Author, Post};
use crate::retry::RetryConfig;
use crate::state::StateDb;

use self::error::DownloadError;
use self::paths::Layout;

/// Subset of application config consumed by the download engine.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub(crate) layout: Layout,
    pub(crate) retry: RetryConfig,
    pub(crate) no_progress_bar: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.downloaded + self.skipped + self.failed
    }
}

/// Byte-level progress bar for a single download.
///
/// Hidden when the user passed `--no-progress-bar` or stdout is not a TTY.
fn create_progress_bar(no_progress_bar: bool) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(file::FALLBACK_CONTENT_LENGTH);
    let style = ProgressStyle::with_template(
        "{msg} [{bar:40.cyan/blue}] {percent:>3}% {bytes}/{total_bytes} ({eta})",
    )
    .map(|s| s.progress_chars("=> "))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Download one post's media to its deterministic path.
///
/// The media URL is resolved before the destination is checked, so a post
/// without media is a failure even if a file with its name exists.
async fn download_post(
    client: &Client,
    config: &DownloadConfig,
    unique_name: &str,
    post: &Post,
) -> Result<PathBuf, DownloadError> {
    let url = post.media_url().ok_or(DownloadError::MediaMissing(post.id))?;
    let download_path = config.layout.video_path(unique_name, post.id);

    if tokio::fs::try_exists(&download_path).await? {
        return Err(DownloadError::AlreadyExists(download_path));
    }
    if let Some(parent) = download_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pb = create_progress_bar(config.no_progress_bar);
    pb.set_message(post.id.to_string());
    let result = file::download_file(client, url, &download_path, &config.retry, &pb).await;
    pb.finish_and_clear();

    let bytes = result?;
    tracing::debug!(bytes, path = %download_path.display(), "downloaded");
    Ok(download_path)
}

/// Write the batch's raw post payloads for later inspection.
async fn write_snapshot(config: &DownloadConfig, unique_name: &str, posts: &[Post]) -> Result<PathBuf> {
    let snapshot_path = config.layout.snapshot_path(unique_name, Utc::now());
    if let Some(parent) = snapshot_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let body = serde_json::to_vec_pretty(posts)?;
    tokio::fs::write(&snapshot_path, body)
        .await
        .with_context(|| format!("Failed to write snapshot {}", snapshot_path.display()))?;
    Ok(snapshot_path)
}

/// Download every post of a batch and record each outcome.
///
/// The first post's author is stored as the owning user before anything else
/// is written. After the loop, the batch is snapshotted and the watermark is
/// moved to the highest post ID in the batch, whatever the per-post outcomes.
pub async fn process_batch(
    client: &Client,
    db: &dyn StateDb,
    config: &DownloadConfig,
    posts: &[Post],
) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();
    let Some(first) = posts.first() else {
        tracing::info!("No new posts to download");
        return Ok(summary);
    };

    let author: &Author = &first.author;
    let unique_name = author.unique_id.as_str();
    db.upsert_user(&author.uid, Some(unique_name), Some(&author.sec_uid), true)
        .await?;

    let started = Instant::now();
    for post in posts {
        match download_post(client, config, unique_name, post).await {
            Ok(path) => {
                db.upsert_post(post.id, &author.uid, true, None).await?;
                summary.downloaded += 1;
                tracing::info!("Downloaded {}", path.display());
            }
            Err(DownloadError::AlreadyExists(path)) => {
                summary.skipped += 1;
                tracing::info!("Skipping {}: already exists", path.display());
            }
            Err(e) => {
                tracing::warn!("Failed to download post {}: {}", post.id, e);
                db.upsert_post(post.id, &author.uid, false, Some(&e.to_string()))
                    .await?;
                summary.failed += 1;
            }
        }
    }

    let snapshot = write_snapshot(config, unique_name, posts).await?;
    tracing::debug!("Wrote snapshot {}", snapshot.display());

    tracing::info!(
        "Downloaded {}/{} posts from {}",
        summary.downloaded + summary.skipped,
        summary.total(),
        unique_name
    );
    tracing::info!(
        "Saved: {} Skipped: {} Failed: {} ({})",
        summary.downloaded,
        summary.skipped,
        summary.failed,
        format_duration(started.elapsed())
    );

    if let Some(highest) = posts.iter().map(|p| p.id).max() {
        db.upsert_watermark(&author.uid, highest, Utc::now()).await?;
        tracing::debug!("Watermark for {} is now {}", unique_name, highest);
    }

    Ok(summary)
}

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
