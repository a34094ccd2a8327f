//! Retry with linear back-off for upstream HTTP calls.
//!
//! [`retry_with_backoff`] wraps any fallible async operation. The caller
//! supplies a classifier that decides, per error, whether another attempt is
//! worthwhile and whether the upstream asked for a specific delay
//! (`Retry-After`). Search queries and plain page fetches share this wrapper.

use std::future::Future;
use std::time::Duration;

use crate::error::ExtractError;

/// Attempt budget and delay schedule for one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Delay before retry `n` is `base_delay × n`.
    pub base_delay: Duration,
    /// Upper bound for any single delay, including upstream `Retry-After`.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32, requested: Option<Duration>) -> Duration {
        let scheduled = requested.unwrap_or_else(|| self.base_delay.saturating_mul(attempt));
        scheduled.min(self.max_delay)
    }
}

/// Outcome of classifying one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Stop,
    Retry { after: Option<Duration> },
}

/// Runs `operation` until it succeeds, the classifier says stop, or
/// `policy.max_attempts` attempts have been made. The last error is returned.
pub async fn retry_with_backoff<T, E, C, F, Fut>(
    policy: &RetryPolicy,
    classify: C,
    mut operation: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    C: Fn(&E) -> RetryDecision,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let RetryDecision::Retry { after } = classify(&err) else {
            return Err(err);
        };
        if attempt >= max_attempts {
            tracing::warn!(attempt, max_attempts, error = %err, "retries exhausted");
            return Err(err);
        }

        let delay = policy.delay_for(attempt, after);
        tracing::warn!(
            attempt,
            max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "transient upstream error, retrying after back-off"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Classifier for [`ExtractError`] values produced by HTTP call sites.
///
/// Retriable:
/// - HTTP 403, 429 and 5xx responses, honoring a parsed `Retry-After`.
/// - Transport timeouts and connection failures.
///
/// Everything else (other 4xx, malformed bodies) stops immediately.
#[must_use]
pub fn classify_extract_error(err: &ExtractError) -> RetryDecision {
    match err {
        ExtractError::UpstreamQueryFailed {
            status,
            retry_after_secs,
            ..
        } if is_retriable_status(*status) => RetryDecision::Retry {
            after: retry_after_secs.map(Duration::from_secs),
        },
        ExtractError::Http(e) if e.is_timeout() || e.is_connect() => {
            RetryDecision::Retry { after: None }
        }
        _ => RetryDecision::Stop,
    }
}

#[must_use]
pub fn is_retriable_status(status: u16) -> bool {
    status == 403 || status == 429 || (500..600).contains(&status)
}

/// Parses a `Retry-After` header given in whole seconds. HTTP-date values are ignored.
#[must_use]
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}
