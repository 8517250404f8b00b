//! Retrying JSON POST shared by the HTTP clients

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, warn};

use super::LlmError;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Delay before retry number `attempt` (1-based)
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt.saturating_sub(1)))
}

fn map_send_error(e: reqwest::Error, timeout: Duration) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout(timeout)
    } else {
        LlmError::Network(e)
    }
}

/// One POST; any non-success status becomes an error
async fn send_once(
    http: &Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    timeout: Duration,
) -> Result<Response, LlmError> {
    let mut request = http.post(url).header(CONTENT_TYPE, "application/json").json(body);
    if let Some(key) = bearer {
        request = request.header(AUTHORIZATION, format!("Bearer {}", key));
    }

    let response = request.send().await.map_err(|e| map_send_error(e, timeout))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs);
    let message = response.text().await.unwrap_or_default();
    Err(LlmError::from_status(status.as_u16(), message, retry_after))
}

/// POST `body` to `url`, retrying transient failures with exponential backoff
///
/// Whether a failure is retried is decided by [`LlmError::is_transient`], so a
/// 429 comes back at once as [`LlmError::RateLimited`].
pub(super) async fn post_json(
    http: &Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
    timeout: Duration,
) -> Result<Response, LlmError> {
    debug!(%url, max_retries, "post_json: called");
    let mut attempt = 0;

    loop {
        let err = match send_once(http, url, bearer, body, timeout).await {
            Ok(response) => {
                debug!(attempt, "post_json: success");
                return Ok(response);
            }
            Err(e) => e,
        };

        if !err.is_transient() || attempt >= max_retries {
            debug!(attempt, error = %err, "post_json: giving up");
            return Err(err);
        }

        attempt += 1;
        let backoff = backoff_delay(attempt);
        warn!(attempt, backoff_ms = backoff.as_millis() as u64, error = %err, "post_json: retrying after transient error");
        tokio::time::sleep(backoff).await;
    }
}
