//! Event router and dispatcher
//!
//! Turns one change envelope into at most one vector store mutation:
//! deletes remove the point keyed by the `before` image's id, every other
//! operation projects the `after` image, embeds it and upserts it under the
//! same id. Upserts replace by id, so redelivered events are harmless.

use crate::envelope;
use crate::error::{EventError, MalformedEvent};
use crate::projector;
use crate::retry::with_retry;
use crate::routing::{Route, RouteTable};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use vecsync_core::{ChangeEvent, Operation, Record, RecordId, RetryPolicy, VectorPoint};
use vecsync_vector::{EmbeddingClient, VectorStore};

/// Mutation performed for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    Updated,
    Snapshot,
    /// Upsert for an event with an unrecognized op code
    Upserted,
    Deleted,
}

impl Action {
    fn for_upsert(operation: Operation) -> Self {
        match operation {
            Operation::Create => Self::Created,
            Operation::Update => Self::Updated,
            Operation::Snapshot => Self::Snapshot,
            Operation::Delete | Operation::Unknown => Self::Upserted,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::Snapshot => "Snapshot",
            Self::Upserted => "Upserted",
            Self::Deleted => "Deleted",
        };
        f.write_str(name)
    }
}

/// Successful outcome of dispatching one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub collection: String,
    pub id: RecordId,
    pub action: Action,
}

impl fmt::Display for Applied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.action, self.collection, self.id)
    }
}

/// Routes decoded events to the embedding client and vector store
pub struct Dispatcher {
    routes: RouteTable,
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    id_field: String,
    dimension: usize,
    retry: RetryPolicy,
}

impl Dispatcher {
    /// Create a dispatcher using the embedder's dimension, the `Id` key
    /// field and the default retry policy
    pub fn new(
        routes: RouteTable,
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            dimension: embedder.dimension(),
            routes,
            embedder,
            store,
            id_field: "Id".to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    /// Dimension every collection was created with
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decode and apply raw message bytes
    pub async fn dispatch_bytes(&self, bytes: &[u8], topic: &str) -> Result<Applied, EventError> {
        let event = envelope::decode_bytes(bytes, topic)?;
        self.apply(&event).await
    }

    /// Decode and apply a parsed envelope
    pub async fn dispatch(&self, raw: &Value, topic: &str) -> Result<Applied, EventError> {
        let event = envelope::decode(raw, topic)?;
        self.apply(&event).await
    }

    /// Apply a decoded event
    pub async fn apply(&self, event: &ChangeEvent) -> Result<Applied, EventError> {
        let route = self.routes.resolve(&event.source_topic).ok_or_else(|| {
            MalformedEvent::Unrouted {
                topic: event.source_topic.clone(),
            }
        })?;

        match event.operation {
            Operation::Delete => self.delete(route, event).await,
            Operation::Unknown => {
                tracing::warn!(
                    topic = %event.source_topic,
                    "Unrecognized op code, treating event as an upsert"
                );
                self.upsert(route, event).await
            }
            _ => self.upsert(route, event).await,
        }
    }

    async fn delete(&self, route: &Route, event: &ChangeEvent) -> Result<Applied, EventError> {
        let before = event.authoritative().ok_or(MalformedEvent::MissingBefore)?;
        let id = self.record_id(before)?;

        with_retry(&self.retry, "delete", || {
            self.store.delete(&route.collection, &id)
        })
        .await
        .map_err(|f| EventError::Store {
            attempts: f.attempts,
            source: f.error,
        })?;

        Ok(Applied {
            collection: route.collection.clone(),
            id,
            action: Action::Deleted,
        })
    }

    async fn upsert(&self, route: &Route, event: &ChangeEvent) -> Result<Applied, EventError> {
        let after = event.authoritative().ok_or(MalformedEvent::MissingAfter)?;
        let id = self.record_id(after)?;

        let text = projector::project(route.entity, after);
        tracing::debug!(collection = %route.collection, %id, text = %text, "Projected record");

        let vector = with_retry(&self.retry, "embed", || self.embedder.embed(&text))
            .await
            .map_err(|f| EventError::Provider {
                attempts: f.attempts,
                source: f.error,
            })?;

        if vector.len() != self.dimension {
            return Err(EventError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let point = VectorPoint {
            id: id.clone(),
            vector,
            payload: after.clone(),
        };

        with_retry(&self.retry, "upsert", || {
            self.store.upsert(&route.collection, &point)
        })
        .await
        .map_err(|f| EventError::Store {
            attempts: f.attempts,
            source: f.error,
        })?;

        Ok(Applied {
            collection: route.collection.clone(),
            id,
            action: Action::for_upsert(event.operation),
        })
    }

    fn record_id(&self, record: &Record) -> Result<RecordId, MalformedEvent> {
        RecordId::from_record(record, &self.id_field).ok_or_else(|| {
            MalformedEvent::MissingRecordId {
                field: self.id_field.clone(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_labels() {
        assert_eq!(Action::for_upsert(Operation::Create), Action::Created);
        assert_eq!(Action::for_upsert(Operation::Update), Action::Updated);
        assert_eq!(Action::for_upsert(Operation::Snapshot), Action::Snapshot);
        assert_eq!(Action::for_upsert(Operation::Unknown), Action::Upserted);

        let applied = Applied {
            collection: "products".to_string(),
            id: RecordId::Num(1),
            action: Action::Created,
        };
        assert_eq!(applied.to_string(), "Created products/1");
    }
}
