mod destination;
mod error;
mod record;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use destination::{DEFAULT_PORT, Destination, DestinationError};
pub use error::{ErrorKind, StoreError};
pub use record::{ABSENT_FIELD, BenchRecord, MARKER_FIELD, MARKER_VALUE, RecordId};

/// Boxed future returned by store methods (keeps the traits object-safe).
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

// ════════════════════════════════════════════════════════════════
//  Access mode
// ════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Seed, read, write, remove, clean up.
    ReadWrite,
    /// Only query existing data. Stores may route reads to a non-primary member.
    ReadOnly,
}

impl AccessMode {
    pub fn from_readonly(readonly: bool) -> Self {
        if readonly { Self::ReadOnly } else { Self::ReadWrite }
    }

    pub fn is_writable(self) -> bool {
        self == Self::ReadWrite
    }
}

// ════════════════════════════════════════════════════════════════
//  Store traits
// ════════════════════════════════════════════════════════════════

/// One handle to the benchmarked collection.
///
/// The engine doesn't know concrete backends; for the engine a collection
/// is just this trait. Each worker owns its own handle.
pub trait BenchStore: Send + Sync {
    /// Read operation: query every document and drain the result.
    /// Returns the number of documents read.
    fn query_all(&self) -> StoreFuture<'_, usize>;

    /// Write operation: insert one record.
    fn insert<'a>(&'a self, record: &'a BenchRecord) -> StoreFuture<'a, ()>;

    /// Remove operation: delete every record carrying the marker field.
    fn remove_marked(&self) -> StoreFuture<'_, u64>;

    /// Number of records carrying the marker field.
    fn count_marked(&self) -> StoreFuture<'_, u64>;
}

/// Opens independent handles to a destination.
pub trait StoreFactory: Send + Sync {
    fn open<'a>(&'a self, destination: &'a Destination, mode: AccessMode) -> StoreFuture<'a, Arc<dyn BenchStore>>;
}
