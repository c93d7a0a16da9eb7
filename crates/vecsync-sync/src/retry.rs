//! Bounded retry for embedding and store calls

use std::future::Future;
use vecsync_core::{RetryPolicy, VecsyncError};

/// The last error of a call that never succeeded
#[derive(Debug)]
pub struct RetryFailure {
    pub attempts: u32,
    pub error: VecsyncError,
}

/// Run `call` until it succeeds, fails permanently, or the policy's attempt
/// budget is spent. Backs off exponentially between attempts.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = vecsync_core::Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff_delay(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(RetryFailure { attempts: attempt, error }),
        }
    }
}
