//! In-memory vector store
//!
//! Mirrors the Qdrant semantics the pipeline depends on: replace-by-id
//! upserts, absent-tolerant deletes, fixed collection dimension. Used for
//! dry runs and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use vecsync_core::{RecordId, Result, VecsyncError, VectorPoint};

#[derive(Debug, Default)]
struct Collection {
    dimension: usize,
    points: HashMap<RecordId, VectorPoint>,
}

/// Vector store backed by a process-local map
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the given collections already created
    pub fn with_collections<'a>(
        names: impl IntoIterator<Item = &'a str>,
        dimension: usize,
    ) -> Self {
        let collections = names
            .into_iter()
            .map(|name| {
                (
                    name.to_string(),
                    Collection {
                        dimension,
                        points: HashMap::new(),
                    },
                )
            })
            .collect();

        Self {
            collections: RwLock::new(collections),
        }
    }

    /// Fetch a stored point
    pub fn get(&self, collection: &str, id: &RecordId) -> Option<VectorPoint> {
        self.read()
            .ok()?
            .get(collection)
            .and_then(|c| c.points.get(id).cloned())
    }

    /// Number of points in a collection (0 if it does not exist)
    pub fn len(&self, collection: &str) -> usize {
        self.read()
            .ok()
            .and_then(|c| c.get(collection).map(|c| c.points.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .read()
            .map_err(|_| VecsyncError::store_permanent("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .write()
            .map_err(|_| VecsyncError::store_permanent("memory store lock poisoned"))
    }
}

fn not_found(collection: &str) -> VecsyncError {
    VecsyncError::store_permanent(format!("Collection `{collection}` doesn't exist"))
}

#[async_trait]
impl super::VectorStore for MemoryStore {
    async fn upsert(&self, collection: &str, point: &VectorPoint) -> Result<()> {
        let mut collections = self.write()?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection))?;

        if point.vector.len() != target.dimension {
            return Err(VecsyncError::store_permanent(format!(
                "Wrong input: Vector dimension error: expected dim: {}, got {}",
                target.dimension,
                point.vector.len()
            )));
        }

        target.points.insert(point.id.clone(), point.clone());
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> Result<()> {
        let mut collections = self.write()?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection))?;

        target.points.remove(id);
        Ok(())
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(collection))
    }

    async fn create_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        let mut collections = self.write()?;
        if collections.contains_key(collection) {
            return Err(VecsyncError::store_permanent(format!(
                "Collection `{collection}` already exists"
            )));
        }

        collections.insert(
            collection.to_string(),
            Collection {
                dimension,
                points: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        self.read().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VectorStore;
    use serde_json::json;

    fn point(id: u64, name: &str) -> VectorPoint {
        VectorPoint {
            id: RecordId::Num(id),
            vector: vec![0.1, 0.2, 0.3],
            payload: json!({ "Id": id, "Name": name }).as_object().cloned().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = MemoryStore::with_collections(["products"], 3);

        store.upsert("products", &point(1, "Widget")).await.unwrap();
        store.upsert("products", &point(1, "Gadget")).await.unwrap();

        assert_eq!(store.len("products"), 1);
        let stored = store.get("products", &RecordId::Num(1)).unwrap();
        assert_eq!(stored.payload["Name"], json!("Gadget"));
    }

    #[tokio::test]
    async fn test_delete_absent_is_ok() {
        let store = MemoryStore::with_collections(["products"], 3);

        store.upsert("products", &point(1, "Widget")).await.unwrap();
        store.delete("products", &RecordId::Num(1)).await.unwrap();
        store.delete("products", &RecordId::Num(1)).await.unwrap();

        assert!(store.is_empty("products"));
    }

    #[tokio::test]
    async fn test_rejects_wrong_dimension_and_missing_collection() {
        let store = MemoryStore::with_collections(["products"], 4);

        let err = store.upsert("products", &point(1, "Widget")).await.unwrap_err();
        assert!(!err.is_transient());

        let err = store.upsert("orders", &point(1, "Widget")).await.unwrap_err();
        assert!(matches!(err, VecsyncError::StoreError { .. }));
    }
}
