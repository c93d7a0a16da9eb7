//! vecsync Core - Domain models, configuration and shared error types
//!
//! This crate defines the abstractions shared by every vecsync crate:
//! - Change events decoded from the CDC stream
//! - Record identifiers and vector points
//! - Entity kinds known to the text projector
//! - Common error types
//! - Configuration management

pub mod config;

pub use config::{
    default_routes, AppConfig, ConfigError, EmbeddingConfig, EmbeddingProvider, FailurePolicy,
    KafkaConfig, LoggingConfig, QdrantConfig, ReadinessConfig, RetryPolicy, RouteConfig,
    SyncConfig,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for vecsync operations
#[derive(Error, Debug)]
pub enum VecsyncError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Embedding provider error: {message}")]
    ProviderError { message: String, transient: bool },

    #[error("Vector store error: {message}")]
    StoreError { message: String, transient: bool },

    #[error("Message queue error: {0}")]
    QueueError(String),

    #[error("{dependency} not available after {attempts} attempts")]
    DependencyUnavailable { dependency: String, attempts: u32 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VecsyncError {
    /// Transient embedding failure (network, rate limit, 5xx)
    pub fn provider_transient(message: impl Into<String>) -> Self {
        Self::ProviderError {
            message: message.into(),
            transient: true,
        }
    }

    /// Permanent embedding failure (auth, bad request, bad response)
    pub fn provider_permanent(message: impl Into<String>) -> Self {
        Self::ProviderError {
            message: message.into(),
            transient: false,
        }
    }

    /// Transient vector store failure
    pub fn store_transient(message: impl Into<String>) -> Self {
        Self::StoreError {
            message: message.into(),
            transient: true,
        }
    }

    /// Permanent vector store failure
    pub fn store_permanent(message: impl Into<String>) -> Self {
        Self::StoreError {
            message: message.into(),
            transient: false,
        }
    }

    /// Whether retrying the failed call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ProviderError { transient, .. } | Self::StoreError { transient, .. } => {
                *transient
            }
            Self::QueueError(_) => true,
            _ => false,
        }
    }
}

impl From<ConfigError> for VecsyncError {
    fn from(err: ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VecsyncError>;

// ============================================================================
// Change Events
// ============================================================================

/// A row image: field name to value, in column order
pub type Record = Map<String, Value>;

/// Kind of row-level change carried by an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Snapshot,
    Delete,
    Unknown,
}

impl Operation {
    /// Decode a Debezium `op` code. Unrecognized or missing codes map to `Unknown`.
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("c") => Self::Create,
            Some("u") => Self::Update,
            Some("r") => Self::Snapshot,
            Some("d") => Self::Delete,
            _ => Self::Unknown,
        }
    }

    /// Delete events are authoritative on the `before` image
    pub fn uses_before(&self) -> bool {
        matches!(self, Self::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Snapshot => write!(f, "snapshot"),
            Self::Delete => write!(f, "delete"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One decoded change envelope
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub source_topic: String,
    pub operation: Operation,
    pub before: Option<Record>,
    pub after: Option<Record>,
}

impl ChangeEvent {
    /// The row image that decides the outcome of this event.
    ///
    /// `before` for deletes, `after` for everything else. An empty object
    /// counts as absent.
    pub fn authoritative(&self) -> Option<&Record> {
        let side = if self.operation.uses_before() {
            self.before.as_ref()
        } else {
            self.after.as_ref()
        };
        side.filter(|record| !record.is_empty())
    }
}

// ============================================================================
// Points
// ============================================================================

/// Primary key of a source row, in a form usable as a vector point id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    Num(u64),
    Uuid(Uuid),
}

impl RecordId {
    /// Extract an id from a field value.
    ///
    /// Accepts non-negative integers, integral strings and UUID strings.
    /// Everything else (null, empty, negative, fractional, other text) is
    /// not a usable id.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(Self::Num),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return None;
                }
                if let Ok(n) = s.parse::<u64>() {
                    return Some(Self::Num(n));
                }
                Uuid::parse_str(s).ok().map(Self::Uuid)
            }
            _ => None,
        }
    }

    /// Look up `field` in a record and extract an id from it
    pub fn from_record(record: &Record, field: &str) -> Option<Self> {
        record.get(field).and_then(Self::from_value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl From<u64> for RecordId {
    fn from(n: u64) -> Self {
        Self::Num(n)
    }
}

/// Unit of storage in a vector collection
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    pub id: RecordId,
    pub vector: Vec<f32>,
    pub payload: Record,
}

// ============================================================================
// Entity Kinds
// ============================================================================

/// Closed set of source entities the pipeline knows how to project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Order,
    OrderItem,
}

impl EntityKind {
    /// Infer the entity from a `<prefix>.<schema>.<table>` topic name.
    ///
    /// The line-item table name contains the order table name, so the
    /// `items` marker must be checked first.
    pub fn infer_from_topic(topic: &str) -> Option<Self> {
        let table = topic.rsplit('.').next().unwrap_or(topic).to_lowercase();

        if table.contains("order") && table.contains("item") {
            Some(Self::OrderItem)
        } else if table.contains("order") {
            Some(Self::Order)
        } else if table.contains("product") {
            Some(Self::Product)
        } else {
            None
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Product => write!(f, "product"),
            Self::Order => write!(f, "order"),
            Self::OrderItem => write!(f, "order_item"),
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "product" => Ok(Self::Product),
            "order" => Ok(Self::Order),
            "order_item" | "orderitem" => Ok(Self::OrderItem),
            _ => Err(ConfigError::InvalidValue {
                key: "entity".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_operation_codes() {
        assert_eq!(Operation::from_code(Some("c")), Operation::Create);
        assert_eq!(Operation::from_code(Some("u")), Operation::Update);
        assert_eq!(Operation::from_code(Some("r")), Operation::Snapshot);
        assert_eq!(Operation::from_code(Some("d")), Operation::Delete);
        assert_eq!(Operation::from_code(Some("t")), Operation::Unknown);
        assert_eq!(Operation::from_code(None), Operation::Unknown);
    }

    #[test]
    fn test_authoritative_side() {
        let delete = ChangeEvent {
            source_topic: "t".to_string(),
            operation: Operation::Delete,
            before: Some(record(json!({"Id": 1}))),
            after: None,
        };
        assert_eq!(delete.authoritative().unwrap()["Id"], json!(1));

        let update = ChangeEvent {
            operation: Operation::Update,
            before: Some(record(json!({"Id": 1}))),
            after: Some(Record::new()),
            ..delete
        };
        assert!(update.authoritative().is_none());
    }

    #[test]
    fn test_record_id_extraction() {
        assert_eq!(RecordId::from_value(&json!(42)), Some(RecordId::Num(42)));
        assert_eq!(RecordId::from_value(&json!(0)), Some(RecordId::Num(0)));
        assert_eq!(RecordId::from_value(&json!("7")), Some(RecordId::Num(7)));

        let uuid = "550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(
            RecordId::from_value(&json!(uuid)),
            Some(RecordId::Uuid(Uuid::parse_str(uuid).unwrap()))
        );

        assert_eq!(RecordId::from_value(&json!(null)), None);
        assert_eq!(RecordId::from_value(&json!("")), None);
        assert_eq!(RecordId::from_value(&json!("  ")), None);
        assert_eq!(RecordId::from_value(&json!(-1)), None);
        assert_eq!(RecordId::from_value(&json!(1.5)), None);
        assert_eq!(RecordId::from_value(&json!("abc")), None);
        assert_eq!(RecordId::from_value(&json!({"id": 1})), None);
    }

    #[test]
    fn test_entity_inference_checks_items_first() {
        assert_eq!(
            EntityKind::infer_from_topic("legacy.public.OrderItems"),
            Some(EntityKind::OrderItem)
        );
        assert_eq!(
            EntityKind::infer_from_topic("legacy.public.Orders"),
            Some(EntityKind::Order)
        );
        assert_eq!(
            EntityKind::infer_from_topic("legacy.public.Products"),
            Some(EntityKind::Product)
        );
        assert_eq!(EntityKind::infer_from_topic("legacy.public.Customers"), None);
    }

    #[test]
    fn test_entity_parse() {
        assert_eq!("order_item".parse::<EntityKind>().unwrap(), EntityKind::OrderItem);
        assert_eq!("Product".parse::<EntityKind>().unwrap(), EntityKind::Product);
        assert!("customer".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_error_transience() {
        assert!(VecsyncError::provider_transient("429").is_transient());
        assert!(!VecsyncError::provider_permanent("401").is_transient());
        assert!(VecsyncError::store_transient("unavailable").is_transient());
        assert!(!VecsyncError::ConfigError("x".to_string()).is_transient());
    }
}
