//! vecsync Configuration Management
//!
//! Handles configuration from environment variables and TOML files with
//! defaults that match the docker-compose development stack. The host builds
//! one `AppConfig` at startup and passes it down; nothing below the host
//! reads the environment.

use crate::EntityKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Kafka consumer settings
    pub kafka: KafkaConfig,

    /// Qdrant connection
    pub qdrant: QdrantConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Topic to collection routes
    pub routes: Vec<RouteConfig>,

    /// Pipeline behaviour
    pub sync: SyncConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            kafka: KafkaConfig::default(),
            qdrant: QdrantConfig::default(),
            embedding: EmbeddingConfig::default(),
            routes: default_routes(),
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Only keys that are present are applied, so file values survive
    /// unless the environment explicitly replaces them.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Kafka
        if let Some(servers) = lookup("KAFKA_BOOTSTRAP_SERVERS") {
            self.kafka.bootstrap_servers = servers;
        }
        if let Some(group) = lookup("KAFKA_GROUP_ID") {
            self.kafka.group_id = group;
        }
        if let Some(reset) = lookup("KAFKA_AUTO_OFFSET_RESET") {
            self.kafka.auto_offset_reset = reset;
        }

        // Qdrant
        if let Some(url) = lookup("QDRANT_URL") {
            self.qdrant.url = url;
        }
        if let Some(key) = lookup("QDRANT_API_KEY") {
            self.qdrant.api_key = Some(key);
        }

        // Embedding
        if let Some(provider) = lookup("EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.embedding.openai_api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.embedding.openai_base_url = Some(url);
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.embedding.ollama_url = url;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(size) = lookup("VECTOR_SIZE") {
            self.embedding.dimension = size.parse().map_err(|_| ConfigError::InvalidValue {
                key: "VECTOR_SIZE".to_string(),
                value: size,
            })?;
        }

        // Routes: "topic=collection[:entity],..."
        if let Some(routes) = lookup("SYNC_ROUTES") {
            self.routes = parse_routes(&routes)?;
        }

        // Sync
        if let Some(policy) = lookup("SYNC_FAILURE_POLICY") {
            self.sync.failure_policy = policy.parse()?;
        }
        if let Some(field) = lookup("SYNC_ID_FIELD") {
            self.sync.id_field = field;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        Ok(self)
    }

    /// Check the invariants the pipeline relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.routes.is_empty() {
            return Err(ConfigError::MissingRequired("routes".to_string()));
        }

        let mut topics = HashSet::new();
        for route in &self.routes {
            if route.collection.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: format!("routes[{}].collection", route.topic),
                    value: route.collection.clone(),
                });
            }
            if !topics.insert(route.topic.as_str()) {
                return Err(ConfigError::InvalidValue {
                    key: "routes.topic".to_string(),
                    value: format!("duplicate topic {}", route.topic),
                });
            }
            if route.entity_kind().is_none() {
                return Err(ConfigError::InvalidValue {
                    key: format!("routes[{}].entity", route.topic),
                    value: "cannot infer entity kind from topic".to_string(),
                });
            }
        }

        if self.embedding.provider == EmbeddingProvider::OpenAI
            && self
                .embedding
                .openai_api_key
                .as_deref()
                .map_or(true, |k| k.trim().is_empty())
        {
            return Err(ConfigError::MissingRequired("OPENAI_API_KEY".to_string()));
        }

        if self.embedding.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                key: "embedding.dimension".to_string(),
                value: "0".to_string(),
            });
        }

        if self.sync.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sync.retry.max_attempts".to_string(),
                value: "0".to_string(),
            });
        }

        if self.sync.max_poll_failures == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sync.max_poll_failures".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }
}

fn parse_routes(value: &str) -> Result<Vec<RouteConfig>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let invalid = || ConfigError::InvalidValue {
                key: "SYNC_ROUTES".to_string(),
                value: entry.to_string(),
            };
            let (topic, target) = entry.split_once('=').ok_or_else(invalid)?;
            let (collection, entity) = match target.split_once(':') {
                Some((collection, entity)) => (collection, Some(entity.trim().parse()?)),
                None => (target, None),
            };
            if topic.trim().is_empty() || collection.trim().is_empty() {
                return Err(invalid());
            }
            Ok(RouteConfig {
                topic: topic.trim().to_string(),
                collection: collection.trim().to_string(),
                entity,
            })
        })
        .collect()
}

/// Kafka consumer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Comma-separated broker list
    pub bootstrap_servers: String,

    /// Consumer group id
    pub group_id: String,

    /// Where to start when the group has no committed offset
    pub auto_offset_reset: String,

    /// Group session timeout in milliseconds
    pub session_timeout_ms: u32,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "kafka:29092".to_string(),
            group_id: "qdrant-sync-group".to_string(),
            // Process all historical events
            auto_offset_reset: "earliest".to_string(),
            session_timeout_ms: 10_000,
        }
    }
}

/// Qdrant connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    /// Qdrant gRPC URL
    pub url: String,

    /// Optional API key
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://qdrant:6334".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider to use
    pub provider: EmbeddingProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for Azure or compatible APIs)
    pub openai_base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Embedding model name
    pub model: String,

    /// Vector dimension (must match the model and every collection)
    pub dimension: usize,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAI,
            openai_api_key: None,
            openai_base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536, // OpenAI text-embedding-3-small
            timeout_secs: 60,
        }
    }
}

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAI,
    Ollama,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// One topic to collection route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Full topic name, `<prefix>.<schema>.<table>`
    pub topic: String,

    /// Target collection
    pub collection: String,

    /// Entity kind; inferred from the topic's table name when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityKind>,
}

impl RouteConfig {
    pub fn new(topic: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            collection: collection.into(),
            entity: None,
        }
    }

    pub fn with_entity(mut self, entity: EntityKind) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Explicit entity, or the one inferred from the topic
    pub fn entity_kind(&self) -> Option<EntityKind> {
        self.entity.or_else(|| EntityKind::infer_from_topic(&self.topic))
    }
}

/// Routes for the legacy shop database (Debezium prefix `legacy`)
pub fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig::new("legacy.public.Products", "products"),
        RouteConfig::new("legacy.public.Orders", "orders"),
        RouteConfig::new("legacy.public.OrderItems", "order_items"),
    ]
}

/// Pipeline behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Primary key field in row images
    pub id_field: String,

    /// Retry policy for embedding and store calls
    pub retry: RetryPolicy,

    /// What to do with an event whose calls failed after retries
    pub failure_policy: FailurePolicy,

    /// Startup dependency probing
    pub readiness: ReadinessConfig,

    /// Create missing collections before consuming
    pub bootstrap_collections: bool,

    /// Consecutive failed polls after which the consumer gives up
    pub max_poll_failures: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            id_field: "Id".to_string(),
            retry: RetryPolicy::default(),
            failure_policy: FailurePolicy::Skip,
            readiness: ReadinessConfig::default(),
            bootstrap_collections: true,
            max_poll_failures: 30,
        }
    }
}

/// Bounded exponential backoff for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first call
    pub max_attempts: u32,

    /// Delay before the first retry
    pub base_delay_ms: u64,

    /// Upper bound for any single delay
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let delay = self.base_delay_ms.saturating_mul(2u64.saturating_pow(exp));
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Host decision for events that failed after retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log, commit the offset and continue
    #[default]
    Skip,
    /// Stop without committing so the event is redelivered on restart
    Halt,
}

impl std::str::FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "halt" => Ok(Self::Halt),
            _ => Err(ConfigError::InvalidValue {
                key: "SYNC_FAILURE_POLICY".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Startup readiness probing
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub max_attempts: u32,
    pub interval_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval_secs: 5,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
