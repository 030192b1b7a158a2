//! Shared request plumbing and failure classification.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use docrag_core::{Error, Result};

/// Builds the client shared by one backend. `timeout` bounds a whole request.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("docrag/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))
}

/// Joins a base URL and an endpoint path without doubling the slash.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// 408, 429 and every 5xx are worth retrying; other statuses are not.
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Connect failures and timeouts are transient, anything else on the send path is fatal.
pub fn classify_send_error(backend: &'static str, err: reqwest::Error) -> Error {
    let message = format!("request failed: {err}");
    let classified = if err.is_timeout() || err.is_connect() || err.is_request() {
        Error::transient(backend, message)
    } else {
        Error::fatal(backend, message)
    };
    classified.with_source(err)
}

/// POST `body` as JSON and decode a JSON response.
///
/// Non-success statuses become `Backend` errors carrying the response body; a
/// body that does not decode as `Resp` becomes a `Parse` error.
pub async fn post_json<Req, Resp>(
    client: &reqwest::Client,
    backend: &'static str,
    url: &str,
    api_key: Option<&str>,
    body: &Req,
) -> Result<Resp>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let mut request = client.post(url).json(body);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }
    let response = request.send().await.map_err(|e| classify_send_error(backend, e))?;

    let status = response.status();
    let bytes = response.bytes().await.map_err(|e| classify_send_error(backend, e))?;
    if !status.is_success() {
        let text = String::from_utf8_lossy(&bytes);
        let message = format!("HTTP {status}: {}", text.trim());
        return Err(if is_transient_status(status) {
            Error::transient(backend, message)
        } else {
            Error::fatal(backend, message)
        });
    }

    serde_json::from_slice(&bytes).map_err(|e| Error::parse(backend, format!("invalid response body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_statuses() {
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::REQUEST_TIMEOUT));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
        assert!(!is_transient_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn endpoint_joins_cleanly() {
        assert_eq!(endpoint("https://x/v1/", "/embeddings"), "https://x/v1/embeddings");
        assert_eq!(endpoint("https://x/v1", "chat/completions"), "https://x/v1/chat/completions");
    }
}
