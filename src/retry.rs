//! Retry-with-backoff helper (spec.md §7)
//!
//! A small internal helper rather than a new dependency: exponential
//! backoff with a fixed cap, cancellable via [`CancellationToken`] so a
//! caller that tears down a swap mid-retry doesn't leave an orphaned sleep
//! loop running.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

const MAX_ATTEMPTS: u32 = 5;
const BASE_DELAY: Duration = Duration::from_millis(200);
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Retry `operation` up to [`MAX_ATTEMPTS`] times with exponential backoff,
/// returning early if `token` is cancelled or the last attempt's error is
/// returned once retries are exhausted.
pub async fn with_backoff<F, Fut, T, E>(token: &CancellationToken, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= MAX_ATTEMPTS || token.is_cancelled() {
                    return Err(err);
                }
                let delay = BASE_DELAY.saturating_mul(1 << (attempt - 1)).min(MAX_DELAY);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = token.cancelled() => return Err(err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_immediately_without_retrying() {
        let token = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff(&token, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let token = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff(&token, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err("not yet") } else { Ok(7) } }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff(&token, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err("still failing") }
        })
        .await;

        assert_eq!(result, Err("still failing"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
