//! Send loop shared by the completion clients

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::LlmError;

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Used when a 429 carries no usable `retry-after`
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Delay before retry number `attempt`, doubling from the initial backoff
fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt.saturating_sub(1)))
}

fn retry_after(headers: &HeaderMap) -> Duration {
    let secs = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
    Duration::from_secs(secs)
}

/// Send the request `build` produces and decode the JSON reply
///
/// Network errors and statuses accepted by `retryable` are retried with
/// exponential backoff. A 429 returns `RateLimited` immediately.
pub(crate) async fn send_with_retry<T, B>(build: B, retryable: fn(u16) -> bool) -> Result<T, LlmError>
where
    T: DeserializeOwned,
    B: Fn() -> RequestBuilder,
{
    let mut last_error = None;
    for attempt in 0..=MAX_RETRIES {
        if attempt > 0 {
            let delay = backoff(attempt);
            warn!(attempt, delay_ms = delay.as_millis() as u64, "send_with_retry: retrying after transient error");
            tokio::time::sleep(delay).await;
        }

        let response = match build().send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(attempt, error = %e, "send_with_retry: network error");
                last_error = Some(LlmError::Network(e));
                continue;
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            debug!("send_with_retry: rate limited");
            return Err(LlmError::RateLimited {
                retry_after: retry_after(response.headers()),
            });
        }

        if status.is_success() {
            debug!("send_with_retry: success");
            return Ok(response.json().await?);
        }

        let code = status.as_u16();
        let error = LlmError::ApiError {
            status: code,
            message: response.text().await.unwrap_or_default(),
        };
        if retryable(code) && attempt < MAX_RETRIES {
            debug!(attempt, status = code, "send_with_retry: retryable status");
            last_error = Some(error);
            continue;
        }
        return Err(error);
    }

    Err(last_error.unwrap_or_else(|| LlmError::InvalidResponse("Max retries exceeded".to_string())))
}
