use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{IngestError, Result};

const MAX_RETRIES: u32 = 3;
const USER_AGENT: &str = concat!("youtubingest/", env!("CARGO_PKG_VERSION"));

/// A small JSON-over-HTTP client shared by every API caller in the crate.
///
/// Transient failures (connection errors, `5xx`) are retried with the same
/// doubling backoff the teacher crate used for connection resets
/// (100ms, 200ms, 400ms), plus up to 50ms of jitter so that concurrent
/// callers retrying the same upstream hiccup don't all wake up in lockstep.
/// `429`/`403` are not retried here: those carry YouTube-specific meaning
/// (quota, rate limit) that only the caller can interpret, so the raw
/// response is handed back for inspection.
#[derive(Debug, Clone)]
pub struct JsonHttpClient {
    client: reqwest::Client,
}

impl JsonHttpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::Internal(format!("failed to build http client: {e}")))?;
        Ok(Self { client })
    }

    /// `GET` the given URL with query parameters, retrying transient failures,
    /// and return the raw response for the caller to classify by status code.
    pub async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Response> {
        let mut last_error: Option<IngestError> = None;

        for attempt in 0..MAX_RETRIES {
            let result = self.client.get(url).query(query).send().await;
            match result {
                Ok(response) if !is_transient_failure(&response) => return Ok(response),
                Ok(response) => {
                    last_error = Some(status_to_error(response.status()));
                }
                Err(err) => {
                    last_error = Some(IngestError::from(err));
                }
            }

            if attempt < MAX_RETRIES - 1 {
                let wait = Duration::from_millis(100 * (1 << attempt) + jitter_millis());
                tokio::time::sleep(wait).await;
            }
        }

        Err(last_error.unwrap_or(IngestError::Timeout))
    }

    /// Convenience wrapper that parses a successful response body as JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self.get_with_retry(url, query).await?;
        if !response.status().is_success() {
            return Err(status_to_error(response.status()));
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(IngestError::from)
    }

    /// `GET` a plain-text resource (used by the transcript backend, which
    /// fetches XML/JSON caption tracks that are not Data API JSON envelopes).
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.get_with_retry(url, &[]).await?;
        if !response.status().is_success() {
            return Err(status_to_error(response.status()));
        }
        Ok(response.text().await?)
    }
}

/// A cheap 0-50ms jitter source derived from the wall clock's sub-millisecond
/// component, avoiding a dependency on a dedicated random number crate for a
/// single low-stakes use.
fn jitter_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 % 50)
        .unwrap_or(0)
}

fn is_transient_failure(response: &Response) -> bool {
    response.status().is_server_error()
}

fn status_to_error(status: StatusCode) -> IngestError {
    match status {
        StatusCode::NOT_FOUND => IngestError::ResourceNotFound("upstream returned 404".into()),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => IngestError::QuotaExceeded,
        s if s.is_server_error() => {
            IngestError::ServiceUnavailable(format!("upstream status {s}"))
        }
        s => IngestError::Internal(format!("unexpected upstream status {s}")),
    }
}
