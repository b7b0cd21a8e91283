use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::error::FetchError;
use super::types::{Envelope, PostsPage, PostsResponse, ResolvedUser, UserProfile, UserResponse};
use super::TikTokApi;
use crate::retry::{self, RetryAction, RetryConfig};

pub const DEFAULT_API_URL: &str = "https://tokapi-mobile-version.p.rapidapi.com";

/// tokapi client authenticated with a static RapidAPI key.
pub struct RapidApiClient {
    http: Client,
    base_url: Url,
    host: String,
    api_key: String,
    retry: RetryConfig,
}

impl std::fmt::Debug for RapidApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RapidApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl RapidApiClient {
    /// Build a client. A missing or blank key is rejected here so the
    /// process fails before any work starts.
    pub fn new(
        api_key: Option<&str>,
        base_url: &str,
        retry: RetryConfig,
    ) -> anyhow::Result<Self> {
        let api_key = match api_key.map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => anyhow::bail!("API key is required (set API_KEY or pass --api-key)"),
        };
        let parsed = Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("Invalid API URL '{}': {}", base_url, e))?;
        if parsed.cannot_be_a_base() {
            anyhow::bail!("API URL '{}' cannot take a path", base_url);
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("API URL '{}' has no host", base_url))?
            .to_string();

        Ok(Self {
            http: Client::builder().build()?,
            base_url: parsed,
            host,
            api_key,
            retry,
        })
    }

    /// Base URL with `segments` appended, each percent-encoded as one
    /// path segment.
    fn endpoint_url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = self.endpoint_url(segments);
        retry::retry_with_backoff(
            &self.retry,
            |e: &FetchError| {
                if e.is_retryable() {
                    RetryAction::Retry
                } else {
                    RetryAction::Abort
                }
            },
            || self.attempt_get(&url, query),
        )
        .await
    }

    async fn attempt_get<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let endpoint = url.path();
        tracing::debug!(%url, ?query, "GET");

        let response = self
            .http
            .get(url.clone())
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.host)
            .query(query)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| FetchError::Http {
            endpoint: endpoint.to_string(),
            source,
        })?;
        decode(endpoint, &body)
    }
}

/// Check the envelope's `status_code`, then deserialize the typed body.
fn decode<T: DeserializeOwned>(endpoint: &str, body: &[u8]) -> Result<T, FetchError> {
    let invalid = |source| FetchError::Invalid {
        endpoint: endpoint.to_string(),
        source,
    };
    let value: Value = serde_json::from_slice(body).map_err(invalid)?;
    let envelope = Envelope::deserialize(&value).map_err(invalid)?;
    if envelope.status_code != 0 {
        return Err(FetchError::Status {
            endpoint: endpoint.to_string(),
            code: envelope.status_code,
        });
    }
    serde_json::from_value(value).map_err(invalid)
}

#[async_trait]
impl TikTokApi for RapidApiClient {
    async fn get_user_posts(
        &self,
        user_id: &str,
        count: u32,
        offset: u64,
    ) -> Result<PostsPage, FetchError> {
        let resp: PostsResponse = self
            .get_json(
                &["v1", "post", "user", user_id, "posts"],
                &[("count", count.to_string()), ("offset", offset.to_string())],
            )
            .await?;
        Ok(resp.into())
    }

    async fn get_user_info(&self, user_id: &str) -> Result<UserProfile, FetchError> {
        let resp: UserResponse = self.get_json(&["v1", "user", user_id], &[]).await?;
        Ok(resp.user)
    }

    async fn resolve_username(&self, username: &str) -> Result<ResolvedUser, FetchError> {
        self.get_json(&["v1", "user", "username", username], &[])
            .await
    }
}
