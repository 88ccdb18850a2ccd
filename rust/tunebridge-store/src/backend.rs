use async_trait::async_trait;
use serde_json::Value;

use crate::TrackStoreError;

mod memory;
pub use memory::*;

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
mod indexeddb;
#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
pub use indexeddb::*;

/// A [TrackDatabase] is a facade over an embedded, IndexedDB-shaped database:
/// named databases with a schema version, each holding named object stores.
///
/// Content scripts are single-threaded, so none of these traits require
/// `Send`.
#[async_trait(?Send)]
pub trait TrackDatabase {
    /// An open connection to one database
    type Connection: TrackConnection;

    /// Open the named database at the given schema version.
    ///
    /// Like IndexedDB, opening a database that does not exist yet succeeds
    /// and yields an empty database.
    async fn open(&self, name: &str, version: u32) -> Result<Self::Connection, TrackStoreError>;
}

/// An open database connection. The connection is released when dropped.
pub trait TrackConnection {
    /// The read-only transaction type of this connection
    type Transaction: ReadTransaction;

    /// Start a read-only transaction spanning the given object stores.
    ///
    /// This fails immediately (without suspending) when any of the stores
    /// does not exist.
    fn read_only(&self, stores: &[&str]) -> Result<Self::Transaction, TrackStoreError>;
}

/// A read-only view of a consistent snapshot of some object stores.
#[async_trait(?Send)]
pub trait ReadTransaction {
    /// Forward cursor over the values of one object store
    type Cursor: ShardCursor;

    /// Read the value stored under `key`, or `None` when the key is absent.
    async fn get(&self, store: &str, key: &str) -> Result<Option<Value>, TrackStoreError>;

    /// Open a forward cursor over every value in `store`, in key order.
    fn open_cursor(&self, store: &str) -> Result<Self::Cursor, TrackStoreError>;
}

/// A forward cursor over the encoded shards of an object store.
#[async_trait(?Send)]
pub trait ShardCursor {
    /// Advance to the next position, yielding its encoded shard, or `None`
    /// once the cursor is exhausted.
    async fn next(&mut self) -> Result<Option<String>, TrackStoreError>;
}
