//! vecsync Vector - Vector store and embedding abstractions
//!
//! Provides abstraction over vector databases (Qdrant, in-memory) and
//! embedding providers (OpenAI, Ollama) for keeping record embeddings in
//! sync with their source rows.

use async_trait::async_trait;
use vecsync_core::{RecordId, Result, VectorPoint};

pub mod embedding;
pub mod memory_store;
pub mod qdrant_store;

pub use embedding::{create_embedding_client, EmbeddingClient, OllamaEmbedding, OpenAiEmbedding};
pub use memory_store::MemoryStore;
pub use qdrant_store::QdrantStore;

/// Trait for vector database operations
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace a point by id
    async fn upsert(&self, collection: &str, point: &VectorPoint) -> Result<()>;

    /// Remove a point by id. Removing an absent id succeeds.
    async fn delete(&self, collection: &str, id: &RecordId) -> Result<()>;

    /// Check whether a collection exists
    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    /// Create a collection with the given dimension and cosine distance
    async fn create_collection(&self, collection: &str, dimension: usize) -> Result<()>;

    /// Cheap liveness check
    async fn health_check(&self) -> Result<()>;
}

/// Create every missing collection. Returns the names that were created.
pub async fn bootstrap_collections(
    store: &dyn VectorStore,
    collections: &[String],
    dimension: usize,
) -> Result<Vec<String>> {
    let mut created = Vec::new();

    for name in collections {
        if store.collection_exists(name).await? {
            tracing::info!(collection = %name, "Collection exists");
            continue;
        }

        store.create_collection(name, dimension).await?;
        tracing::info!(collection = %name, dimension, "Created collection");
        created.push(name.clone());
    }

    Ok(created)
}
