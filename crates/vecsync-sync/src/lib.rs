//! vecsync Sync - CDC to vector index pipeline
//!
//! Consumes Debezium change events from Kafka and keeps Qdrant collections
//! consistent with the source tables:
//!
//! 1. **Envelope**: decode the change envelope and its operation kind
//! 2. **Routing**: map the source topic to a collection and entity kind
//! 3. **Projector**: render the row image as text
//! 4. **Dispatcher**: embed the text and upsert, or delete by id
//! 5. **Consumer**: feed events one at a time, commit after each
//!
//! The host builds an [`AppConfig`] and calls [`run`], or [`run_dry`] to
//! exercise the pipeline against an in-memory store without committing
//! offsets.

pub mod consumer;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod kafka;
pub mod projector;
pub mod readiness;
pub mod retry;
pub mod routing;

pub use consumer::{ChangeSource, ConsumerLoop, Delivery, LoopStats};
pub use dispatcher::{Action, Applied, Dispatcher};
pub use error::{ErrorKind, EventError, MalformedEvent};
pub use kafka::KafkaSource;
pub use routing::{Route, RouteTable};

use std::future::Future;
use std::sync::Arc;
use vecsync_core::{AppConfig, KafkaConfig, Result, VecsyncError};
use vecsync_vector::{
    bootstrap_collections, create_embedding_client, EmbeddingClient, MemoryStore, QdrantStore,
    VectorStore,
};

/// Whether consumed events are committed back to Kafka
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Live,
    /// Separate consumer group, no commits, collections always bootstrapped
    DryRun,
}

/// Run the pipeline against Qdrant until Ctrl-C or a fatal error
pub async fn run(config: AppConfig) -> Result<()> {
    let store: Arc<dyn VectorStore> = Arc::new(QdrantStore::new(&config.qdrant)?);
    let pipeline = Pipeline::from_config(config, store)?;
    run_kafka(pipeline, shutdown_signal()).await
}

/// Run the pipeline against an in-memory store. The production consumer
/// group's offsets are left untouched.
pub async fn run_dry(config: AppConfig) -> Result<()> {
    let store: Arc<dyn VectorStore> = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::from_config(config, store)?.with_mode(RunMode::DryRun);
    run_kafka(pipeline, shutdown_signal()).await
}

async fn run_kafka<F>(pipeline: Pipeline, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let kafka = pipeline.kafka_config();
    readiness::wait_for("Kafka", &pipeline.config.sync.readiness, || {
        KafkaSource::ping(&kafka)
    })
    .await?;

    let source = KafkaSource::new(&kafka, &pipeline.routes().topics())?;
    let stats = pipeline.run_until(source, shutdown).await?;

    tracing::info!(
        applied = stats.applied,
        skipped = stats.skipped,
        discarded = stats.discarded,
        failed = stats.failed,
        "Consumer stopped"
    );
    Ok(())
}

/// Validated configuration plus the clients one consumer run needs
pub struct Pipeline {
    config: AppConfig,
    store: Arc<dyn VectorStore>,
    dispatcher: Dispatcher,
    mode: RunMode,
}

impl Pipeline {
    /// Build from configuration, creating the configured embedding client
    pub fn from_config(config: AppConfig, store: Arc<dyn VectorStore>) -> Result<Self> {
        config.validate()?;
        let embedder: Arc<dyn EmbeddingClient> =
            Arc::from(create_embedding_client(&config.embedding)?);
        tracing::info!(
            model = %config.embedding.model,
            dimension = config.embedding.dimension,
            "Embedding client initialized"
        );
        Self::new(config, embedder, store)
    }

    /// Build from configuration with an existing embedding client
    pub fn new(
        config: AppConfig,
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        config.validate()?;

        if embedder.dimension() != config.embedding.dimension {
            return Err(VecsyncError::ConfigError(format!(
                "Embedding dimension {} does not match configured dimension {}",
                embedder.dimension(),
                config.embedding.dimension
            )));
        }

        let routes = RouteTable::from_config(&config.routes)?;
        let dispatcher = Dispatcher::new(routes, embedder, store.clone())
            .with_id_field(config.sync.id_field.clone())
            .with_dimension(config.embedding.dimension)
            .with_retry(config.sync.retry);

        Ok(Self {
            config,
            store,
            dispatcher,
            mode: RunMode::Live,
        })
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn routes(&self) -> &RouteTable {
        self.dispatcher.routes()
    }

    /// Kafka settings for this mode. Dry runs join their own consumer group.
    pub fn kafka_config(&self) -> KafkaConfig {
        let mut kafka = self.config.kafka.clone();
        if self.mode == RunMode::DryRun {
            kafka.group_id = format!("{}-dry-run", kafka.group_id);
        }
        kafka
    }

    /// Wait for the vector store and create missing collections
    pub async fn prepare(&self) -> Result<()> {
        readiness::wait_for("Qdrant", &self.config.sync.readiness, || {
            self.store.health_check()
        })
        .await?;

        // An in-memory store starts empty, so it always needs its collections
        if self.config.sync.bootstrap_collections || self.mode == RunMode::DryRun {
            bootstrap_collections(
                self.store.as_ref(),
                &self.routes().collections(),
                self.config.embedding.dimension,
            )
            .await?;
        }
        Ok(())
    }

    /// Prepare the store, then consume `source` until `shutdown` resolves,
    /// the source is exhausted, or a fatal error occurs
    pub async fn run_until<S, F>(self, source: S, shutdown: F) -> Result<LoopStats>
    where
        S: ChangeSource,
        F: Future<Output = ()>,
    {
        self.prepare().await?;

        let mut consumer = ConsumerLoop::new(source, self.dispatcher)
            .with_failure_policy(self.config.sync.failure_policy)
            .with_max_poll_failures(self.config.sync.max_poll_failures);
        if self.mode == RunMode::DryRun {
            consumer = consumer.without_ack();
        }

        tracing::info!(mode = ?self.mode, "Waiting for CDC events...");
        consumer.run_until(shutdown).await
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
