//! Shared test doubles for the sync pipeline
//!
//! Author: hephaex@gmail.com

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vecsync_core::{RecordId, Result, RetryPolicy, RouteConfig, VecsyncError, VectorPoint};
use vecsync_sync::{ChangeSource, Delivery, Dispatcher, RouteTable};
use vecsync_vector::{EmbeddingClient, MemoryStore, VectorStore};

pub const DIM: usize = 8;

pub const PRODUCTS_TOPIC: &str = "legacy.public.Products";
pub const ORDERS_TOPIC: &str = "legacy.public.Orders";
pub const ORDER_ITEMS_TOPIC: &str = "legacy.public.OrderItems";

/// Deterministic embedder with scriptable failures
pub struct FakeEmbedder {
    dimension: usize,
    output_dimension: usize,
    failures: Mutex<VecDeque<VecsyncError>>,
    calls: AtomicUsize,
    texts: Mutex<Vec<String>>,
}

impl FakeEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            output_dimension: dimension,
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        }
    }

    /// Return vectors of a different length than `dimension()` reports
    pub fn with_output_dimension(mut self, output_dimension: usize) -> Self {
        self.output_dimension = output_dimension;
        self
    }

    /// Fail the next calls with these errors, in order
    pub fn failing_with(self, errors: Vec<VecsyncError>) -> Self {
        *self.failures.lock().unwrap() = errors.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let seed = text
            .bytes()
            .fold(17u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        (0..self.output_dimension)
            .map(|i| ((seed.wrapping_add(i as u32) % 1000) as f32) / 1000.0)
            .collect()
    }
}

#[async_trait]
impl EmbeddingClient for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.texts.lock().unwrap().push(text.to_string());
        Ok(self.vector_for(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Memory store that counts mutations and can fail on demand
pub struct RecordingStore {
    inner: MemoryStore,
    failures: Mutex<VecDeque<VecsyncError>>,
    upserts: AtomicUsize,
    deletes: AtomicUsize,
    healthy: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::with_collections(["products", "orders", "order_items"], DIM),
            failures: Mutex::new(VecDeque::new()),
            upserts: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            healthy: true,
        }
    }

    /// Fail every health check
    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Fail the next mutations with these errors, in order
    pub fn failing_with(self, errors: Vec<VecsyncError>) -> Self {
        *self.failures.lock().unwrap() = errors.into();
        self
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn mutations(&self) -> usize {
        self.upserts() + self.deletes()
    }

    pub fn get(&self, collection: &str, id: u64) -> Option<VectorPoint> {
        self.inner.get(collection, &RecordId::Num(id))
    }

    pub fn len(&self, collection: &str) -> usize {
        self.inner.len(collection)
    }

    fn next_failure(&self) -> Option<VecsyncError> {
        self.failures.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl VectorStore for RecordingStore {
    async fn upsert(&self, collection: &str, point: &VectorPoint) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.next_failure() {
            return Err(err);
        }
        self.inner.upsert(collection, point).await
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.next_failure() {
            return Err(err);
        }
        self.inner.delete(collection, id).await
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        self.inner.collection_exists(collection).await
    }

    async fn create_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        self.inner.create_collection(collection, dimension).await
    }

    async fn health_check(&self) -> Result<()> {
        if !self.healthy {
            return Err(VecsyncError::store_transient("connection refused"));
        }
        self.inner.health_check().await
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 2,
    }
}

pub fn routes() -> RouteTable {
    RouteTable::from_config(&[
        RouteConfig::new(PRODUCTS_TOPIC, "products"),
        RouteConfig::new(ORDERS_TOPIC, "orders"),
        RouteConfig::new(ORDER_ITEMS_TOPIC, "order_items"),
    ])
    .unwrap()
}

pub fn dispatcher(embedder: &Arc<FakeEmbedder>, store: &Arc<RecordingStore>) -> Dispatcher {
    Dispatcher::new(routes(), embedder.clone(), store.clone())
        .with_dimension(DIM)
        .with_retry(fast_retry())
}

/// A Debezium envelope with the usual `payload` wrapper
pub fn envelope(op: &str, before: Value, after: Value) -> Value {
    json!({
        "schema": {},
        "payload": {
            "op": op,
            "before": before,
            "after": after,
            "source": { "table": "Products" }
        }
    })
}

pub fn widget() -> Value {
    json!({
        "Id": 1,
        "Name": "Widget",
        "Description": "A small widget",
        "Category": "Tools",
        "Price": 9.99,
        "StockQuantity": 12
    })
}

/// Replays a fixed list of polls and records acknowledged offsets.
/// `ack_log` outlives the source once a loop has taken ownership of it.
#[derive(Default)]
pub struct ScriptedSource {
    pub polls: VecDeque<Result<Delivery>>,
    pub acked: Vec<i64>,
    pub ack_log: Arc<Mutex<Vec<i64>>>,
    pub fail_acks: bool,
}

impl ScriptedSource {
    pub fn new(deliveries: Vec<Delivery>) -> Self {
        Self {
            polls: deliveries.into_iter().map(Ok).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ChangeSource for ScriptedSource {
    async fn next(&mut self) -> Result<Option<Delivery>> {
        self.polls.pop_front().transpose()
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<()> {
        if self.fail_acks {
            return Err(VecsyncError::QueueError("commit failed".to_string()));
        }
        self.acked.push(delivery.offset);
        self.ack_log.lock().unwrap().push(delivery.offset);
        Ok(())
    }
}

pub fn delivery(topic: &str, offset: i64, message: Option<Value>) -> Delivery {
    Delivery {
        topic: topic.to_string(),
        partition: 0,
        offset,
        payload: message.map(|m| serde_json::to_vec(&m).unwrap()),
    }
}

pub fn create(id: u64) -> Value {
    envelope("c", Value::Null, json!({"Id": id, "Name": format!("Item {id}")}))
}
