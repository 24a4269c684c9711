use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::RwLock;

use speed_api::{
    ABSENT_FIELD, AccessMode, BenchRecord, BenchStore, Destination, MARKER_FIELD, MARKER_VALUE,
    StoreError, StoreFactory, StoreFuture,
};

// ═══════════════════════════════════════════════════════════════
//  MemoryCollection
// ═══════════════════════════════════════════════════════════════

/// In-process collection: documents as JSON keyed by their serialized `_id`.
/// Used for dry runs without a server.
#[derive(Default)]
pub struct MemoryCollection {
    docs: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryCollection {
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }
}

fn is_marked(doc: &serde_json::Value) -> bool {
    doc.get(MARKER_FIELD).and_then(|v| v.as_str()) == Some(MARKER_VALUE)
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStore — one handle
// ═══════════════════════════════════════════════════════════════

pub struct MemoryStore {
    collection: Arc<MemoryCollection>,
    mode: AccessMode,
}

impl MemoryStore {
    fn ensure_writable(&self, op: &str) -> Result<(), StoreError> {
        if self.mode.is_writable() {
            Ok(())
        } else {
            Err(StoreError::config(format!("{op} on a read-only handle")))
        }
    }
}

impl BenchStore for MemoryStore {
    fn query_all(&self) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            let docs = self.collection.docs.read().await;
            // same semantics as `{absent: {$ne: 1}}`
            let n = docs
                .values()
                .filter(|d| d.get(ABSENT_FIELD).and_then(|v| v.as_i64()) != Some(1))
                .count();
            Ok(n)
        })
    }

    fn insert<'a>(&'a self, record: &'a BenchRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.ensure_writable("insert")?;
            let doc = serde_json::to_value(record)?;
            let id = doc["_id"].to_string();

            let mut docs = self.collection.docs.write().await;
            if docs.contains_key(&id) {
                return Err(StoreError::duplicate(format!("duplicate key: _id {id}")));
            }
            docs.insert(id, doc);
            Ok(())
        })
    }

    fn remove_marked(&self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            self.ensure_writable("remove")?;
            let mut docs = self.collection.docs.write().await;
            let before = docs.len();
            docs.retain(|_, d| !is_marked(d));
            Ok((before - docs.len()) as u64)
        })
    }

    fn count_marked(&self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let docs = self.collection.docs.read().await;
            Ok(docs.values().filter(|d| is_marked(d)).count() as u64)
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStoreFactory
// ═══════════════════════════════════════════════════════════════

/// Every handle opened for the same `db.collection` shares one collection.
#[derive(Default)]
pub struct MemoryStoreFactory {
    collections: Mutex<HashMap<String, Arc<MemoryCollection>>>,
}

impl MemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(&self, destination: &Destination) -> Result<Arc<MemoryCollection>, StoreError> {
        let mut map = self
            .collections
            .lock()
            .map_err(|_| StoreError::io("memory store registry poisoned"))?;
        Ok(map.entry(destination.namespace()).or_default().clone())
    }
}

impl StoreFactory for MemoryStoreFactory {
    fn open<'a>(&'a self, destination: &'a Destination, mode: AccessMode) -> StoreFuture<'a, Arc<dyn BenchStore>> {
        Box::pin(async move {
            let collection = self.collection(destination)?;
            let store: Arc<dyn BenchStore> = Arc::new(MemoryStore { collection, mode });
            Ok(store)
        })
    }
}
