//! Bounded retry with exponential backoff for store writes.

use std::time::Duration;
use tokio::time::sleep;

/// Retry an async operation with exponential backoff.
///
/// `max_attempts` counts the first try. The delay doubles after every
/// failed attempt; the final error is returned unchanged.
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    max_attempts: u32,
    initial_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = initial_delay;

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    "attempt {}/{} failed: {}, retrying after {:?}",
                    attempt,
                    max_attempts,
                    e,
                    delay
                );
                sleep(delay).await;
                delay *= 2;
            }
            Err(e) => {
                tracing::error!("all {} attempts failed, last error: {}", max_attempts, e);
                return Err(e);
            }
        }
    }

    unreachable!()
}
