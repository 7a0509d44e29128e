//! Shared plumbing for the JSON-over-HTTP upstream clients.

use crate::error::{RelayError, Result, Upstream};
use reqwest::{Client, Response};
use std::time::Duration;

/// Default request timeout for every upstream call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) fn build_client(service: Upstream, timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RelayError::provider(service, format!("Failed to create HTTP client: {}", e)))
}

pub(crate) fn request_failed(service: Upstream, err: reqwest::Error) -> RelayError {
    RelayError::provider(service, format!("HTTP request failed: {}", err))
}

/// Pass through a 2xx response; turn anything else into a provider error
/// carrying the status and whatever body the upstream sent.
pub(crate) async fn ensure_success(service: Upstream, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = if body.trim().is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, body.trim())
    };
    Err(RelayError::provider(service, detail))
}

pub(crate) async fn parse_json<T: serde::de::DeserializeOwned>(
    service: Upstream,
    response: Response,
) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| RelayError::provider(service, format!("Failed to parse response: {}", e)))
}

pub(crate) fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
