//! Qdrant implementation for vector storage
//!
//! Provides connection management and point mutations for synced records.
//! Mutations are sent with `wait = true`, so `Ok` means the point is applied.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeletePointsBuilder, Distance, PointId, PointStruct, PointsIdsList,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Qdrant, QdrantError};
use std::collections::HashMap;
use std::time::Duration;
use vecsync_core::{QdrantConfig, RecordId, Result, VecsyncError, VectorPoint};

// gRPC status codes that will not succeed on retry
const INVALID_ARGUMENT: i32 = 3;
const NOT_FOUND: i32 = 5;
const PERMISSION_DENIED: i32 = 7;
const FAILED_PRECONDITION: i32 = 9;
const UNAUTHENTICATED: i32 = 16;

/// Qdrant vector store implementation
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    /// Create a new Qdrant connection
    pub fn new(config: &QdrantConfig) -> Result<Self> {
        let client = Qdrant::from_url(&config.url)
            .api_key(config.api_key.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VecsyncError::ConfigError(format!("Qdrant connection failed: {e}")))?;

        Ok(Self { client })
    }
}

fn point_id(id: &RecordId) -> PointId {
    match id {
        RecordId::Num(n) => PointId::from(*n),
        RecordId::Uuid(u) => PointId::from(u.to_string()),
    }
}

fn store_error(context: &str, err: QdrantError) -> VecsyncError {
    let transient = match &err {
        QdrantError::ResponseError { status } => !matches!(
            status.code() as i32,
            INVALID_ARGUMENT | NOT_FOUND | PERMISSION_DENIED | FAILED_PRECONDITION | UNAUTHENTICATED
        ),
        _ => true,
    };

    VecsyncError::StoreError {
        message: format!("{context}: {err}"),
        transient,
    }
}

#[async_trait]
impl super::VectorStore for QdrantStore {
    async fn upsert(&self, collection: &str, point: &VectorPoint) -> Result<()> {
        let payload: HashMap<String, qdrant_client::qdrant::Value> = point
            .payload
            .iter()
            .map(|(k, v)| (k.clone(), v.clone().into()))
            .collect();

        let point = PointStruct::new(point_id(&point.id), point.vector.clone(), payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, vec![point]).wait(true))
            .await
            .map_err(|e| store_error("Failed to upsert point", e))?;

        Ok(())
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> Result<()> {
        // Qdrant treats deleting an unknown id as a successful no-op
        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(PointsIdsList {
                        ids: vec![point_id(id)],
                    })
                    .wait(true),
            )
            .await
            .map_err(|e| store_error("Failed to delete point", e))?;

        Ok(())
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| store_error("Failed to list collections", e))?;

        Ok(collections.collections.iter().any(|c| c.name == collection))
    }

    async fn create_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| store_error("Failed to create collection", e))?;

        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        self.client
            .health_check()
            .await
            .map_err(|e| store_error("Qdrant health check failed", e))?;

        Ok(())
    }
}
