//! Consumer loop
//!
//! Pulls one message at a time, dispatches it to completion and only then
//! acknowledges it. An acknowledgement means the event was applied or
//! definitively discarded; with `FailurePolicy::Halt` a failed event is
//! never acknowledged and the loop stops instead. A loop built with
//! `without_ack` never acknowledges anything.

use crate::dispatcher::Dispatcher;
use crate::error::{ErrorKind, EventError};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use vecsync_core::{FailurePolicy, Result, VecsyncError};

/// One message pulled from the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// `None` for tombstones
    pub payload: Option<Vec<u8>>,
}

/// Ordered source of change messages with explicit acknowledgement
#[async_trait]
pub trait ChangeSource: Send {
    /// Next message in delivery order. `Ok(None)` means the source is
    /// exhausted.
    async fn next(&mut self) -> Result<Option<Delivery>>;

    /// Mark a message as processed
    async fn ack(&mut self, delivery: &Delivery) -> Result<()>;
}

/// Counters for one loop run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub applied: u64,
    pub skipped: u64,
    pub discarded: u64,
    pub failed: u64,
}

/// Sequential consume → dispatch → acknowledge loop
pub struct ConsumerLoop<S> {
    source: S,
    dispatcher: Dispatcher,
    failure_policy: FailurePolicy,
    error_backoff: Duration,
    max_poll_failures: u32,
    acknowledge: bool,
    stats: LoopStats,
}

impl<S: ChangeSource> ConsumerLoop<S> {
    pub fn new(source: S, dispatcher: Dispatcher) -> Self {
        Self {
            source,
            dispatcher,
            failure_policy: FailurePolicy::Skip,
            error_backoff: Duration::from_secs(1),
            max_poll_failures: 30,
            acknowledge: true,
            stats: LoopStats::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Pause after a failed poll before polling again
    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Give up after this many consecutive failed polls
    pub fn with_max_poll_failures(mut self, max: u32) -> Self {
        self.max_poll_failures = max.max(1);
        self
    }

    /// Process events without committing them back to the source
    pub fn without_ack(mut self) -> Self {
        self.acknowledge = false;
        self
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Consume until the source is exhausted or a fatal error occurs
    pub async fn run(&mut self) -> Result<LoopStats> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Consume until `shutdown` resolves, the source is exhausted, or a fatal
    /// error occurs. Shutdown is only observed between events.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<LoopStats>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut poll_failures = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping consumer");
                    break;
                }
                next = self.source.next() => next,
            };

            match next {
                Ok(Some(delivery)) => {
                    poll_failures = 0;
                    self.process(delivery).await?;
                }
                Ok(None) => {
                    info!("Change source exhausted");
                    break;
                }
                Err(e) => {
                    poll_failures += 1;
                    if poll_failures >= self.max_poll_failures {
                        error!(error = %e, poll_failures, "Giving up on change source");
                        return Err(VecsyncError::QueueError(format!(
                            "{poll_failures} consecutive poll failures, last: {e}"
                        )));
                    }
                    warn!(
                        error = %e,
                        poll_failures,
                        max = self.max_poll_failures,
                        "Failed to poll change source"
                    );
                    tokio::time::sleep(self.error_backoff).await;
                }
            }
        }

        Ok(self.stats)
    }

    /// Handle one delivery to completion. Returns `Err` only for conditions
    /// that must stop the loop; the delivery is then left unacknowledged.
    pub async fn process(&mut self, delivery: Delivery) -> Result<()> {
        let Some(bytes) = delivery.payload.as_deref() else {
            debug!(topic = %delivery.topic, offset = delivery.offset, "Skipping tombstone");
            self.stats.skipped += 1;
            return self.ack(&delivery).await;
        };

        match self.dispatcher.dispatch_bytes(bytes, &delivery.topic).await {
            Ok(applied) => {
                info!(
                    topic = %delivery.topic,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    "{applied}"
                );
                self.stats.applied += 1;
            }
            Err(e) => self.handle_failure(&delivery, e)?,
        }

        self.ack(&delivery).await
    }

    fn handle_failure(&mut self, delivery: &Delivery, err: EventError) -> Result<()> {
        match err.kind() {
            ErrorKind::Malformed => {
                if err.is_unrouted() {
                    info!(topic = %delivery.topic, "Unknown topic, discarding event");
                } else {
                    warn!(
                        topic = %delivery.topic,
                        offset = delivery.offset,
                        error = %err,
                        "Discarding malformed event"
                    );
                }
                self.stats.discarded += 1;
                Ok(())
            }
            ErrorKind::Provider | ErrorKind::Store => {
                error!(
                    topic = %delivery.topic,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    error = %err,
                    "Error processing event"
                );
                self.stats.failed += 1;

                match self.failure_policy {
                    FailurePolicy::Skip => Ok(()),
                    FailurePolicy::Halt => Err(VecsyncError::Other(
                        anyhow::Error::new(err).context(format!(
                            "halting at {}[{}]@{}",
                            delivery.topic, delivery.partition, delivery.offset
                        )),
                    )),
                }
            }
            ErrorKind::Config => {
                error!(topic = %delivery.topic, error = %err, "Fatal configuration error");
                self.stats.failed += 1;
                Err(VecsyncError::ConfigError(err.to_string()))
            }
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<()> {
        if !self.acknowledge {
            return Ok(());
        }

        // A lost ack only means redelivery, which upserts tolerate
        if let Err(e) = self.source.ack(delivery).await {
            warn!(
                topic = %delivery.topic,
                offset = delivery.offset,
                error = %e,
                "Failed to commit offset"
            );
        }
        Ok(())
    }
}
