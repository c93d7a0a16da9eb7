//! Kafka change source
//!
//! Auto-commit is disabled; offsets are committed per message after the
//! consumer loop acknowledges it.

use crate::consumer::{ChangeSource, Delivery};
use async_trait::async_trait;
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use std::time::Duration;
use vecsync_core::{KafkaConfig, Result, VecsyncError};

const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

fn client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", &config.bootstrap_servers)
        .set("group.id", &config.group_id)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", &config.auto_offset_reset)
        .set("session.timeout.ms", config.session_timeout_ms.to_string())
        .set("enable.partition.eof", "false");
    client
}

fn queue_error(context: &str, err: impl std::fmt::Display) -> VecsyncError {
    VecsyncError::QueueError(format!("{context}: {err}"))
}

/// Kafka consumer subscribed to every routed topic
pub struct KafkaSource {
    consumer: StreamConsumer,
}

impl KafkaSource {
    pub fn new(config: &KafkaConfig, topics: &[&str]) -> Result<Self> {
        let consumer: StreamConsumer = client_config(config).create().map_err(|e| {
            VecsyncError::ConfigError(format!("Failed to create Kafka consumer: {e}"))
        })?;

        consumer
            .subscribe(topics)
            .map_err(|e| queue_error("Failed to subscribe", e))?;

        tracing::info!(?topics, group = %config.group_id, "Subscribed to topics");
        Ok(Self { consumer })
    }

    /// Check that the brokers answer a metadata request
    pub async fn ping(config: &KafkaConfig) -> Result<()> {
        let client = client_config(config);

        tokio::task::spawn_blocking(move || {
            let consumer: BaseConsumer = client
                .create()
                .map_err(|e| queue_error("Failed to create Kafka client", e))?;
            consumer
                .fetch_metadata(None, METADATA_TIMEOUT)
                .map(|_| ())
                .map_err(|e| queue_error("Kafka metadata request failed", e))
        })
        .await
        .map_err(|e| queue_error("Kafka metadata task failed", e))?
    }
}

#[async_trait]
impl ChangeSource for KafkaSource {
    async fn next(&mut self) -> Result<Option<Delivery>> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| queue_error("Failed to receive message", e))?;

        Ok(Some(Delivery {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            payload: message.payload().map(<[u8]>::to_vec),
        }))
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<()> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(
                &delivery.topic,
                delivery.partition,
                Offset::Offset(delivery.offset + 1),
            )
            .map_err(|e| queue_error("Invalid offset", e))?;

        self.consumer
            .commit(&offsets, CommitMode::Async)
            .map_err(|e| queue_error("Failed to commit offset", e))
    }
}
