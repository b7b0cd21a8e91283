use thiserror::Error;

/// A remote call that did not produce a usable, validated body.
///
/// Transport failures, non-2xx responses, non-zero application status and
/// bodies that fail to deserialize all collapse into this one type so the
/// sync code has a single "fetch failed" condition to propagate.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} from {endpoint}")]
    HttpStatus { endpoint: String, status: u16 },

    #[error("{endpoint} returned status_code {code}")]
    Status { endpoint: String, code: i64 },

    #[error("Unexpected response body from {endpoint}: {source}")]
    Invalid {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Rate limiting, server errors and connection failures are transient;
    /// a rejected or malformed body will not change on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Http { .. } => true,
            FetchError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            FetchError::Status { .. } | FetchError::Invalid { .. } => false,
        }
    }
}
