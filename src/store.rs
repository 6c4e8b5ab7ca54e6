//! ==============================================================================
//! store.rs - remote store abstraction
//! ==============================================================================
//!
//! purpose:
//!     the api reads and writes sensor/control records through an ordered
//!     append store (firebase realtime database in production). handlers only
//!     ever see the `RemoteStore` trait and a `StoreError` they must match on.
//!
//! backends:
//!     - FirebaseStore (firebase.rs): rest api over reqwest
//!     - MemoryStore: in-process collections for demos and tests
//!     - OfflineStore: every call fails, so every request takes the fallback
//!
//! ordering:
//!     records are ordered by their `timestamp` child the way firebase orders
//!     children: missing/null < false < true < numbers < strings < objects,
//!     ties broken by record key.
//!
//! ==============================================================================

use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use tokio::sync::RwLock;

pub const SENSORS: &str = "sensors";
pub const CONTROLS: &str = "controls";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// store unreachable, timed out, refused the request, or not configured
    #[error("store unreachable: {0}")]
    Connectivity(String),
    /// store answered with something we could not read
    #[error("malformed store response: {0}")]
    Parse(String),
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// up to `n` most recent records, oldest first
    async fn fetch_latest(&self, collection: &str, n: usize) -> Result<Vec<Value>, StoreError>;

    /// push a record onto the end of a collection
    async fn append(&self, collection: &str, record: &Value) -> Result<(), StoreError>;
}

// ==============================================================================
// ordering helpers
// ==============================================================================

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(false)) => 1,
        Some(Value::Bool(true)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) | Some(Value::Object(_)) => 5,
    }
}

fn compare_timestamps(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// sort keyed records by timestamp and keep the last `n`
pub fn latest_by_timestamp(mut entries: Vec<(String, Value)>, n: usize) -> Vec<Value> {
    entries.sort_by(|(ka, va), (kb, vb)| {
        compare_timestamps(va.get("timestamp"), vb.get("timestamp")).then_with(|| ka.cmp(kb))
    });
    let skip = entries.len().saturating_sub(n);
    entries.into_iter().skip(skip).map(|(_, v)| v).collect()
}

// ==============================================================================
// offline store
// ==============================================================================

/// used when no database is configured
pub struct OfflineStore {
    reason: String,
}

impl OfflineStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl RemoteStore for OfflineStore {
    async fn fetch_latest(&self, _collection: &str, _n: usize) -> Result<Vec<Value>, StoreError> {
        Err(StoreError::Connectivity(self.reason.clone()))
    }

    async fn append(&self, _collection: &str, _record: &Value) -> Result<(), StoreError> {
        Err(StoreError::Connectivity(self.reason.clone()))
    }
}

// ==============================================================================
// memory store
// ==============================================================================

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<(String, Value)>>>,
    next_key: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self, collection: &str) -> usize {
        self.collections.read().await.get(collection).map_or(0, Vec::len)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn fetch_latest(&self, collection: &str, n: usize) -> Result<Vec<Value>, StoreError> {
        let guard = self.collections.read().await;
        let entries = guard.get(collection).cloned().unwrap_or_default();
        Ok(latest_by_timestamp(entries, n))
    }

    async fn append(&self, collection: &str, record: &Value) -> Result<(), StoreError> {
        // zero-padded so key order == insertion order, like push ids
        let key = format!("{:020}", self.next_key.fetch_add(1, AtomicOrdering::Relaxed));
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push((key, record.clone()));
        Ok(())
    }
}
