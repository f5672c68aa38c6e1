//! Bounded retry with exponential backoff.

use std::future::Future;
use tracing::{debug, warn};

use crate::cache::CachePolicy;
use crate::error::Result;

/// Run `op`, retrying up to `retries` more times on failure.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &CachePolicy,
    retries: u32,
    label: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries => {
                attempt += 1;
                let delay = policy.retry_delay(attempt);
                warn!(
                    label,
                    error = %e,
                    attempt,
                    max_retries = retries,
                    delay_ms = delay.as_millis() as u64,
                    "Console request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                debug!(label, attempts = attempt + 1, "Giving up");
                return Err(e);
            }
        }
    }
}
