use std::sync::Arc;

use mongodb::bson::{Document, doc};
use mongodb::error::{ErrorKind as MongoErrorKind, WriteFailure};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};

use speed_api::{
    ABSENT_FIELD, AccessMode, BenchRecord, BenchStore, Destination, ErrorKind, MARKER_FIELD,
    MARKER_VALUE, StoreError, StoreFactory, StoreFuture,
};

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

/// Map a driver error onto the store error kinds the engine acts on.
fn store_err(e: mongodb::error::Error) -> StoreError {
    let kind = match &*e.kind {
        MongoErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY => ErrorKind::Duplicate,
        MongoErrorKind::InvalidArgument { .. } => ErrorKind::Config,
        MongoErrorKind::ServerSelection { .. } | MongoErrorKind::DnsResolve { .. } => ErrorKind::Connect,
        MongoErrorKind::BsonSerialization(_) | MongoErrorKind::BsonDeserialization(_) => ErrorKind::Format,
        _ => ErrorKind::Io,
    };
    StoreError::new(kind, e.to_string())
}

/// Connection string for a destination. Read-only handles let the driver
/// pick the nearest member, so reads may land on a secondary.
pub fn connection_uri(destination: &Destination, mode: AccessMode) -> String {
    let mut uri = format!("mongodb://{}:{}/", destination.host, destination.port);
    if mode == AccessMode::ReadOnly {
        uri.push_str("?readPreference=nearest");
    }
    uri
}

// ═══════════════════════════════════════════════════════════════
//  CollectionStore
// ═══════════════════════════════════════════════════════════════

/// One client + collection handle. Every `open` builds a new client,
/// so workers never share a connection pool.
pub struct CollectionStore {
    records: Collection<BenchRecord>,
    docs: Collection<Document>,
}

impl CollectionStore {
    pub async fn connect(
        destination: &Destination,
        mode: AccessMode,
        app_name: Option<&str>,
    ) -> Result<Self, StoreError> {
        let uri = connection_uri(destination, mode);
        let mut options = ClientOptions::parse(&uri)
            .await
            .map_err(|e| store_err(e).with_context(format!("parse '{uri}'")))?;
        options.app_name = app_name.map(str::to_string);

        let client = Client::with_options(options).map_err(store_err)?;
        let db = client.database(&destination.database);
        tracing::debug!(%uri, namespace = %destination.namespace(), "mongodb handle opened");

        Ok(Self {
            records: db.collection(&destination.collection),
            docs: db.collection(&destination.collection),
        })
    }
}

impl BenchStore for CollectionStore {
    fn query_all(&self) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            let mut cursor = self
                .docs
                .find(doc! { ABSENT_FIELD: { "$ne": 1 } })
                .await
                .map_err(store_err)?;
            let mut n = 0;
            while cursor.advance().await.map_err(store_err)? {
                n += 1;
            }
            Ok(n)
        })
    }

    fn insert<'a>(&'a self, record: &'a BenchRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.records.insert_one(record).await.map_err(store_err)?;
            Ok(())
        })
    }

    fn remove_marked(&self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let res = self
                .docs
                .delete_many(doc! { MARKER_FIELD: MARKER_VALUE })
                .await
                .map_err(store_err)?;
            Ok(res.deleted_count)
        })
    }

    fn count_marked(&self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            self.docs
                .count_documents(doc! { MARKER_FIELD: MARKER_VALUE })
                .await
                .map_err(store_err)
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MongoStoreFactory
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct MongoStoreFactory {
    app_name: Option<String>,
}

impl MongoStoreFactory {
    pub fn new(app_name: Option<String>) -> Self {
        Self { app_name }
    }
}

impl StoreFactory for MongoStoreFactory {
    fn open<'a>(&'a self, destination: &'a Destination, mode: AccessMode) -> StoreFuture<'a, Arc<dyn BenchStore>> {
        Box::pin(async move {
            let store = CollectionStore::connect(destination, mode, self.app_name.as_deref()).await?;
            let store: Arc<dyn BenchStore> = Arc::new(store);
            Ok(store)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writable_uri_uses_primary() {
        let d: Destination = "localhost/test/bench".parse().unwrap();
        assert_eq!(connection_uri(&d, AccessMode::ReadWrite), "mongodb://localhost:27017/");
    }

    #[test]
    fn readonly_uri_prefers_nearest() {
        let d: Destination = "localhost:27018/test/bench".parse().unwrap();
        assert_eq!(
            connection_uri(&d, AccessMode::ReadOnly),
            "mongodb://localhost:27018/?readPreference=nearest"
        );
    }
}
