use std::path::Path;

use futures_util::StreamExt;
use indicatif::ProgressBar;
use reqwest::Client;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::error::DownloadError;
use super::paths::part_path;
use crate::retry::{self, RetryAction, RetryConfig};

/// Length assumed for progress reporting when the server sends no
/// `Content-Length`.
pub const FALLBACK_CONTENT_LENGTH: u64 = 14_000_000;

pub fn expected_length(content_length: Option<u64>) -> u64 {
    match content_length {
        Some(len) if len > 0 => len,
        _ => FALLBACK_CONTENT_LENGTH,
    }
}

/// Download `url` to `download_path` through a `.part` file.
///
/// Each attempt truncates the `.part` file and streams from scratch; only a
/// complete body is renamed into place, so an interrupted run never leaves
/// a file that looks finished. Transient failures are retried with backoff.
pub async fn download_file(
    client: &Client,
    url: &str,
    download_path: &Path,
    retry_config: &RetryConfig,
    pb: &ProgressBar,
) -> Result<u64, DownloadError> {
    let part_path = part_path(download_path);

    let result = retry::retry_with_backoff(
        retry_config,
        |e: &DownloadError| {
            if e.is_retryable() {
                RetryAction::Retry
            } else {
                RetryAction::Abort
            }
        },
        || attempt_download(client, url, download_path, &part_path, pb),
    )
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&part_path).await;
    }
    result
}

async fn attempt_download(
    client: &Client,
    url: &str,
    download_path: &Path,
    part_path: &Path,
    pb: &ProgressBar,
) -> Result<u64, DownloadError> {
    let path_str = download_path.display().to_string();
    let response = client.get(url).send().await.map_err(|e| DownloadError::Http {
        source: e,
        path: path_str.clone(),
    })?;

    if !response.status().is_success() {
        return Err(DownloadError::HttpStatus {
            status: response.status().as_u16(),
            path: path_str,
        });
    }

    let content_length = response.content_length();
    pb.set_length(expected_length(content_length));
    pb.set_position(0);

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(part_path)
        .await?;

    let mut bytes_written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::warn!(
                "Body error for {} (content_length={:?}, bytes_so_far={}): {}",
                path_str,
                content_length,
                bytes_written,
                e
            );
            DownloadError::Http {
                source: e,
                path: path_str.clone(),
            }
        })?;
        file.write_all(&chunk).await?;
        bytes_written += chunk.len() as u64;
        pb.set_position(bytes_written);
    }
    file.flush().await?;
    drop(file);

    fs::rename(part_path, download_path).await?;
    Ok(bytes_written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_expected_length_fallback() {
        assert_eq!(expected_length(Some(1234)), 1234);
        assert_eq!(expected_length(Some(0)), FALLBACK_CONTENT_LENGTH);
        assert_eq!(expected_length(None), FALLBACK_CONTENT_LENGTH);
    }

    #[tokio::test]
    async fn test_download_writes_file_and_removes_part() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v/1.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video-bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("1.mp4");
        let written = download_file(
            &Client::new(),
            &format!("{}/v/1.mp4", server.uri()),
            &dest,
            &RetryConfig::none(),
            &ProgressBar::hidden(),
        )
        .await
        .unwrap();

        assert_eq!(written, 11);
        assert_eq!(std::fs::read(&dest).unwrap(), b"video-bytes");
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_not_found_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("1.mp4");
        let err = download_file(
            &Client::new(),
            &format!("{}/v/1.mp4", server.uri()),
            &dest,
            &RetryConfig::default(),
            &ProgressBar::hidden(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DownloadError::HttpStatus { status: 404, .. }));
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_server_error_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("1.mp4");
        let retry = RetryConfig {
            max_retries: 2,
            base_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(5),
        };
        download_file(
            &Client::new(),
            &format!("{}/v/1.mp4", server.uri()),
            &dest,
            &retry,
            &ProgressBar::hidden(),
        )
        .await
        .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"ok");
    }
}
