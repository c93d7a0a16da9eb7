//! Startup dependency checks

use std::future::Future;
use std::time::Duration;
use vecsync_core::{ReadinessConfig, Result, VecsyncError};

/// Poll `check` at a fixed interval until it succeeds or the attempt budget
/// is spent.
pub async fn wait_for<F, Fut>(
    dependency: &str,
    config: &ReadinessConfig,
    mut check: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let interval = Duration::from_secs(config.interval_secs);

    for attempt in 1..=config.max_attempts {
        match check().await {
            Ok(()) => {
                tracing::info!("{dependency} is available!");
                return Ok(());
            }
            Err(e) => {
                tracing::info!(
                    error = %e,
                    "Waiting for {dependency}... ({attempt}/{})",
                    config.max_attempts
                );
                if attempt < config.max_attempts {
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    Err(VecsyncError::DependencyUnavailable {
        dependency: dependency.to_string(),
        attempts: config.max_attempts,
    })
}
