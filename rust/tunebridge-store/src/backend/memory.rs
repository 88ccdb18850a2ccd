use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::TrackStoreError;

use super::{ReadTransaction, ShardCursor, TrackConnection, TrackDatabase};

/// Values of one object store, ordered by key like an IndexedDB store.
type ObjectStore = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default)]
struct Database {
    version: u32,
    stores: BTreeMap<String, ObjectStore>,
}

/// An in-memory [TrackDatabase] that follows IndexedDB's open and
/// transaction rules closely enough to stand in for it outside the browser.
///
/// Opening a database that does not exist creates an empty one, opening below
/// the current version fails, and read-only transactions see a snapshot taken
/// when they start.
#[derive(Debug, Clone, Default)]
pub struct MemoryTrackDatabase {
    databases: Arc<RwLock<HashMap<String, Database>>>,
}

impl MemoryTrackDatabase {
    /// Creates the named database at `version` with the given (empty) object
    /// stores. An existing database is upgraded in place: its version is
    /// replaced and missing stores are added.
    pub fn create(&self, name: &str, version: u32, stores: &[&str]) {
        let mut databases = self.databases.write();
        let database = databases.entry(name.to_string()).or_default();

        database.version = version;
        for store in stores {
            database.stores.entry(store.to_string()).or_default();
        }
    }

    /// Stores `value` under `key`, creating the database (at version 1) and
    /// the object store when they do not exist yet.
    pub fn put(&self, name: &str, store: &str, key: &str, value: Value) {
        let mut databases = self.databases.write();
        let database = databases.entry(name.to_string()).or_insert_with(|| Database {
            version: 1,
            stores: BTreeMap::new(),
        });

        database
            .stores
            .entry(store.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Removes the value stored under `key`, if any.
    pub fn delete(&self, name: &str, store: &str, key: &str) {
        let mut databases = self.databases.write();
        if let Some(store) = databases
            .get_mut(name)
            .and_then(|database| database.stores.get_mut(store))
        {
            store.remove(key);
        }
    }

    /// The current version of the named database, if it exists.
    pub fn version(&self, name: &str) -> Option<u32> {
        self.databases.read().get(name).map(|database| database.version)
    }

    /// The object store names of the named database, if it exists.
    pub fn store_names(&self, name: &str) -> Option<Vec<String>> {
        self.databases
            .read()
            .get(name)
            .map(|database| database.stores.keys().cloned().collect())
    }
}

#[async_trait(?Send)]
impl TrackDatabase for MemoryTrackDatabase {
    type Connection = MemoryConnection;

    async fn open(&self, name: &str, version: u32) -> Result<Self::Connection, TrackStoreError> {
        if version == 0 {
            return Err(TrackStoreError::Open {
                name: name.to_string(),
                reason: "The version provided must not be 0.".to_string(),
            });
        }

        let mut databases = self.databases.write();
        let database = databases.entry(name.to_string()).or_insert_with(|| Database {
            version,
            stores: BTreeMap::new(),
        });

        if database.version > version {
            return Err(TrackStoreError::Open {
                name: name.to_string(),
                reason: format!(
                    "The requested version ({version}) is less than the existing version ({}).",
                    database.version
                ),
            });
        }

        database.version = version;

        Ok(MemoryConnection {
            databases: self.databases.clone(),
            name: name.to_string(),
        })
    }
}

/// A connection to one database of a [MemoryTrackDatabase].
#[derive(Debug)]
pub struct MemoryConnection {
    databases: Arc<RwLock<HashMap<String, Database>>>,
    name: String,
}

impl TrackConnection for MemoryConnection {
    type Transaction = MemoryTransaction;

    fn read_only(&self, stores: &[&str]) -> Result<Self::Transaction, TrackStoreError> {
        if stores.is_empty() {
            return Err(TrackStoreError::Transaction(
                "The transaction scope must name at least one object store.".to_string(),
            ));
        }

        let databases = self.databases.read();
        let database = databases.get(&self.name).ok_or_else(|| {
            TrackStoreError::Transaction(format!("Database '{}' was deleted.", self.name))
        })?;

        let mut snapshot = BTreeMap::new();
        for store in stores {
            let contents = database.stores.get(*store).ok_or_else(|| {
                TrackStoreError::Transaction(format!(
                    "One of the specified object stores was not found: '{store}'."
                ))
            })?;
            snapshot.insert(store.to_string(), contents.clone());
        }

        Ok(MemoryTransaction { stores: snapshot })
    }
}

/// A read-only snapshot of the stores a transaction was opened over.
#[derive(Debug)]
pub struct MemoryTransaction {
    stores: BTreeMap<String, ObjectStore>,
}

impl MemoryTransaction {
    fn store(&self, store: &str) -> Result<&ObjectStore, TrackStoreError> {
        self.stores.get(store).ok_or_else(|| {
            TrackStoreError::Transaction(format!(
                "The object store '{store}' is not in the scope of this transaction."
            ))
        })
    }
}

#[async_trait(?Send)]
impl ReadTransaction for MemoryTransaction {
    type Cursor = MemoryShardCursor;

    async fn get(&self, store: &str, key: &str) -> Result<Option<Value>, TrackStoreError> {
        let store = self
            .store(store)
            .map_err(|error| TrackStoreError::Read(error.to_string()))?;
        Ok(store.get(key).cloned())
    }

    fn open_cursor(&self, store: &str) -> Result<Self::Cursor, TrackStoreError> {
        let entries: Vec<_> = self
            .store(store)?
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(MemoryShardCursor {
            entries: entries.into_iter(),
        })
    }
}

/// A cursor over a snapshot of one object store.
#[derive(Debug)]
pub struct MemoryShardCursor {
    entries: std::vec::IntoIter<(String, Value)>,
}

#[async_trait(?Send)]
impl ShardCursor for MemoryShardCursor {
    async fn next(&mut self) -> Result<Option<String>, TrackStoreError> {
        match self.entries.next() {
            Some((_, Value::String(text))) => Ok(Some(text)),
            Some((key, _)) => Err(TrackStoreError::Shard(format!(
                "value at key '{key}' is not a string"
            ))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use testresult::TestResult;

    #[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
    use wasm_bindgen_test::wasm_bindgen_test;

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_creates_an_empty_database_on_first_open() -> TestResult {
        let database = MemoryTrackDatabase::default();

        let connection = database.open("music_1", 6).await?;

        assert_eq!(database.version("music_1"), Some(6));
        assert_eq!(database.store_names("music_1"), Some(vec![]));
        assert!(matches!(
            connection.read_only(&["tracks", "info"]),
            Err(TrackStoreError::Transaction(_))
        ));

        Ok(())
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_refuses_to_open_below_the_existing_version() {
        let database = MemoryTrackDatabase::default();
        database.create("music_1", 7, &["tracks"]);

        let result = database.open("music_1", 6).await;

        assert!(matches!(result, Err(TrackStoreError::Open { .. })));
        assert_eq!(database.version("music_1"), Some(7));
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_upgrades_without_touching_stores() -> TestResult {
        let database = MemoryTrackDatabase::default();
        database.create("music_1", 5, &["tracks", "info"]);

        database.open("music_1", 6).await?;

        assert_eq!(database.version("music_1"), Some(6));
        assert_eq!(
            database.store_names("music_1"),
            Some(vec!["info".to_string(), "tracks".to_string()])
        );

        Ok(())
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_reads_from_the_snapshot_taken_at_transaction_start() -> TestResult {
        let database = MemoryTrackDatabase::default();
        database.create("music_1", 6, &["tracks", "info"]);
        database.put("music_1", "info", "sync_token", json!("before"));

        let connection = database.open("music_1", 6).await?;
        let transaction = connection.read_only(&["tracks", "info"])?;

        database.put("music_1", "info", "sync_token", json!("after"));
        database.put("music_1", "tracks", "0", json!("{}"));

        assert_eq!(
            transaction.get("info", "sync_token").await?,
            Some(json!("before"))
        );
        assert_eq!(transaction.open_cursor("tracks")?.next().await?, None);

        Ok(())
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_walks_values_in_key_order() -> TestResult {
        let database = MemoryTrackDatabase::default();
        database.create("music_1", 6, &["tracks"]);
        database.put("music_1", "tracks", "b", json!("second"));
        database.put("music_1", "tracks", "a", json!("first"));

        let connection = database.open("music_1", 6).await?;
        let transaction = connection.read_only(&["tracks"])?;
        let mut cursor = transaction.open_cursor("tracks")?;

        assert_eq!(cursor.next().await?, Some("first".to_string()));
        assert_eq!(cursor.next().await?, Some("second".to_string()));
        assert_eq!(cursor.next().await?, None);

        Ok(())
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_rejects_stores_outside_the_transaction_scope() -> TestResult {
        let database = MemoryTrackDatabase::default();
        database.create("music_1", 6, &["tracks", "info"]);

        let connection = database.open("music_1", 6).await?;
        let transaction = connection.read_only(&["tracks"])?;

        assert!(matches!(
            transaction.get("info", "sync_token").await,
            Err(TrackStoreError::Read(_))
        ));
        assert!(matches!(
            transaction.open_cursor("info"),
            Err(TrackStoreError::Transaction(_))
        ));

        Ok(())
    }
}
