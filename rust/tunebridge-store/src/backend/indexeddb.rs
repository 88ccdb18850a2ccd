//! IndexedDB-backed [TrackDatabase] for `wasm32-unknown-unknown`.
//!
//! This talks to `web-sys` directly rather than through `rexie`: `rexie`
//! reconciles the object store list during any version upgrade (deleting
//! stores it was not told about), and the database read here belongs to the
//! page. Opening never declares a schema, so a version upgrade leaves the
//! page's stores untouched.
//!
//! Every request's `success`/`error` handlers are registered in the same turn
//! that issues the request. The cursor request fires once per step, so it
//! keeps its handlers for its whole life and feeds a channel instead.

use async_trait::async_trait;
use js_sys::{Array, JSON, Reflect};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use wasm_bindgen::{JsCast, JsValue, closure::Closure};
use web_sys::{
    DomException, Event, IdbCursorWithValue, IdbDatabase, IdbFactory, IdbRequest, IdbTransaction,
    IdbTransactionMode,
};

use crate::TrackStoreError;

use super::{ReadTransaction, ShardCursor, TrackConnection, TrackDatabase};

/// The browser's IndexedDB, as seen from the current global scope.
#[derive(Debug, Clone)]
pub struct IndexedDbTrackDatabase {
    factory: IdbFactory,
}

impl IndexedDbTrackDatabase {
    /// Wraps an explicit factory.
    pub fn new(factory: IdbFactory) -> Self {
        Self { factory }
    }

    /// Looks up `indexedDB` on the current global (window or worker).
    pub fn from_global() -> Result<Self, TrackStoreError> {
        let factory = Reflect::get(&js_sys::global(), &"indexedDB".into())
            .ok()
            .filter(|factory| !factory.is_undefined() && !factory.is_null())
            .ok_or_else(|| TrackStoreError::Open {
                name: String::new(),
                reason: "indexedDB is not available in this context".to_string(),
            })?;

        Ok(Self::new(factory.unchecked_into()))
    }
}

#[async_trait(?Send)]
impl TrackDatabase for IndexedDbTrackDatabase {
    type Connection = IndexedDbConnection;

    async fn open(&self, name: &str, version: u32) -> Result<Self::Connection, TrackStoreError> {
        let open_error = |reason: String| TrackStoreError::Open {
            name: name.to_string(),
            reason,
        };

        let request = self
            .factory
            .open_with_u32(name, version)
            .map_err(|error| open_error(describe(&error)))?;

        let database = await_request(&request)
            .await
            .map_err(open_error)?
            .dyn_into::<IdbDatabase>()
            .map_err(|value| open_error(format!("unexpected open result: {value:?}")))?;

        Ok(IndexedDbConnection { database })
    }
}

/// An open IndexedDB connection, closed when dropped.
#[derive(Debug)]
pub struct IndexedDbConnection {
    database: IdbDatabase,
}

impl TrackConnection for IndexedDbConnection {
    type Transaction = IndexedDbTransaction;

    fn read_only(&self, stores: &[&str]) -> Result<Self::Transaction, TrackStoreError> {
        let scope = Array::new();
        for store in stores {
            scope.push(&JsValue::from_str(store));
        }

        let transaction = self
            .database
            .transaction_with_str_sequence_and_mode(&scope, IdbTransactionMode::Readonly)
            .map_err(|error| TrackStoreError::Transaction(describe(&error)))?;

        Ok(IndexedDbTransaction { transaction })
    }
}

impl Drop for IndexedDbConnection {
    fn drop(&mut self) {
        // Pending transactions still run to completion after close().
        self.database.close();
    }
}

/// A read-only IndexedDB transaction.
#[derive(Debug)]
pub struct IndexedDbTransaction {
    transaction: IdbTransaction,
}

#[async_trait(?Send)]
impl ReadTransaction for IndexedDbTransaction {
    type Cursor = IndexedDbShardCursor;

    async fn get(&self, store: &str, key: &str) -> Result<Option<Value>, TrackStoreError> {
        let read_error = |error: &JsValue| TrackStoreError::Read(describe(error));

        let request = self
            .transaction
            .object_store(store)
            .map_err(|error| read_error(&error))?
            .get(&JsValue::from_str(key))
            .map_err(|error| read_error(&error))?;

        let value = await_request(&request).await.map_err(TrackStoreError::Read)?;

        if value.is_undefined() {
            return Ok(None);
        }

        to_json(&value).map(Some).map_err(TrackStoreError::Read)
    }

    fn open_cursor(&self, store: &str) -> Result<Self::Cursor, TrackStoreError> {
        let request = self
            .transaction
            .object_store(store)
            .map_err(|error| TrackStoreError::Transaction(describe(&error)))?
            .open_cursor()
            .map_err(|error| TrackStoreError::Cursor(describe(&error)))?;

        Ok(IndexedDbShardCursor::listen(request))
    }
}

type CursorEvent = Result<JsValue, String>;

/// A forward cursor whose request stays subscribed until the cursor is
/// dropped.
pub struct IndexedDbShardCursor {
    request: IdbRequest,
    events: mpsc::UnboundedReceiver<CursorEvent>,
    current: Option<IdbCursorWithValue>,
    exhausted: bool,
    _on_success: Closure<dyn FnMut(Event)>,
    _on_error: Closure<dyn FnMut(Event)>,
}

impl IndexedDbShardCursor {
    fn listen(request: IdbRequest) -> Self {
        let (sender, events) = mpsc::unbounded_channel::<CursorEvent>();

        let on_success = {
            let request = request.clone();
            let sender = sender.clone();
            Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
                let _ = sender.send(request.result().map_err(|error| describe(&error)));
            })
        };

        let on_error = {
            let request = request.clone();
            Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
                let _ = sender.send(Err(request_error(&request)));
            })
        };

        request.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        request.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        Self {
            request,
            events,
            current: None,
            exhausted: false,
            _on_success: on_success,
            _on_error: on_error,
        }
    }
}

#[async_trait(?Send)]
impl ShardCursor for IndexedDbShardCursor {
    async fn next(&mut self) -> Result<Option<String>, TrackStoreError> {
        if self.exhausted {
            return Ok(None);
        }

        if let Some(cursor) = self.current.take() {
            cursor
                .continue_()
                .map_err(|error| TrackStoreError::Cursor(describe(&error)))?;
        }

        let result = self
            .events
            .recv()
            .await
            .ok_or_else(|| TrackStoreError::Cursor("cursor request went away".to_string()))?
            .map_err(TrackStoreError::Cursor)?;

        if result.is_null() || result.is_undefined() {
            self.exhausted = true;
            return Ok(None);
        }

        let cursor = result
            .dyn_into::<IdbCursorWithValue>()
            .map_err(|value| TrackStoreError::Cursor(format!("unexpected cursor: {value:?}")))?;
        let value = cursor
            .value()
            .map_err(|error| TrackStoreError::Cursor(describe(&error)))?;
        let shard = value.as_string().ok_or_else(|| {
            TrackStoreError::Shard(format!("stored value is not a string: {value:?}"))
        })?;

        self.current = Some(cursor);

        Ok(Some(shard))
    }
}

impl Drop for IndexedDbShardCursor {
    fn drop(&mut self) {
        self.request.set_onsuccess(None);
        self.request.set_onerror(None);
    }
}

/// Waits for a single-shot request to settle.
///
/// A failed request would abort its whole transaction by default; the error
/// event's default action is prevented so the transaction can keep serving
/// other requests.
async fn await_request(request: &IdbRequest) -> Result<JsValue, String> {
    let (sender, receiver) = oneshot::channel::<Result<JsValue, String>>();
    let sender = std::rc::Rc::new(std::cell::RefCell::new(Some(sender)));

    let on_success = {
        let request = request.clone();
        let sender = sender.clone();
        Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            if let Some(sender) = sender.borrow_mut().take() {
                let _ = sender.send(request.result().map_err(|error| describe(&error)));
            }
        })
    };

    let on_error = {
        let request = request.clone();
        Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            event.prevent_default();
            if let Some(sender) = sender.borrow_mut().take() {
                let _ = sender.send(Err(request_error(&request)));
            }
        })
    };

    request.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
    request.set_onerror(Some(on_error.as_ref().unchecked_ref()));

    let result = receiver
        .await
        .unwrap_or_else(|_| Err("request handlers were dropped".to_string()));

    request.set_onsuccess(None);
    request.set_onerror(None);

    result
}

fn request_error(request: &IdbRequest) -> String {
    match request.error() {
        Ok(Some(exception)) => describe(&exception),
        Ok(None) => "request failed without an error".to_string(),
        Err(error) => describe(&error),
    }
}

fn describe(error: &JsValue) -> String {
    match error.dyn_ref::<DomException>() {
        Some(exception) => format!("{}: {}", exception.name(), exception.message()),
        None => format!("{error:?}"),
    }
}

/// Converts a structured-clone value into JSON by way of `JSON.stringify`.
fn to_json(value: &JsValue) -> Result<Value, String> {
    if let Some(text) = value.as_string() {
        return Ok(Value::String(text));
    }

    let text = JSON::stringify(value)
        .map_err(|error| describe(&error))?
        .as_string()
        .ok_or_else(|| format!("value has no JSON representation: {value:?}"))?;

    serde_json::from_str(&text).map_err(|error| error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{QueryResult, ShardedStoreReader, StoreLayout, SyncToken, TrackRecord};
    use pretty_assertions::assert_eq;
    use rexie::{ObjectStore, RexieBuilder, TransactionMode};
    use serde_json::json;
    use testresult::TestResult;
    use wasm_bindgen_test::wasm_bindgen_test;

    wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_dedicated_worker);

    fn unique_user() -> String {
        format!("test{}", (js_sys::Math::random() * 1e12) as u64)
    }

    async fn seed(name: &str, token: Option<&str>, shards: &[&str]) -> TestResult {
        let db = RexieBuilder::new(name)
            .version(StoreLayout::default().version)
            .add_object_store(ObjectStore::new("tracks"))
            .add_object_store(ObjectStore::new("info"))
            .build()
            .await?;

        let tx = db.transaction(&["tracks", "info"], TransactionMode::ReadWrite)?;
        let tracks = tx.store("tracks")?;
        for (index, shard) in shards.iter().enumerate() {
            tracks
                .put(
                    &JsValue::from_str(shard),
                    Some(&JsValue::from_str(&format!("shard{index}"))),
                )
                .await?;
        }
        if let Some(token) = token {
            tx.store("info")?
                .put(&JsValue::from_str(token), Some(&JsValue::from_str("sync_token")))
                .await?;
        }
        tx.done().await?;
        db.close();

        Ok(())
    }

    #[wasm_bindgen_test]
    async fn it_reads_shards_seeded_by_the_page() -> TestResult {
        let user = unique_user();
        seed(
            &StoreLayout::default().database_name(&user),
            Some("tok123"),
            &[r#"{"a":{"id":1}}"#, r#"{"b":{"id":2},"c":{"id":3}}"#],
        )
        .await?;

        let reader = ShardedStoreReader::new(IndexedDbTrackDatabase::from_global()?);
        let result = reader.query(Some(&user)).await;

        assert_eq!(
            result,
            Some(QueryResult {
                timestamp: Some(SyncToken::from(json!("tok123"))),
                tracks: vec![
                    TrackRecord::from(json!({"id": 1})),
                    TrackRecord::from(json!({"id": 2})),
                    TrackRecord::from(json!({"id": 3})),
                ],
            })
        );

        Ok(())
    }

    #[wasm_bindgen_test]
    async fn it_reports_a_missing_token_as_none() -> TestResult {
        let user = unique_user();
        seed(
            &StoreLayout::default().database_name(&user),
            None,
            &[r#"{"a":{"id":1}}"#],
        )
        .await?;

        let reader = ShardedStoreReader::new(IndexedDbTrackDatabase::from_global()?);
        let result = reader
            .query(Some(&user))
            .await
            .expect("query should resolve to a result");

        assert_eq!(result.timestamp, None);
        assert_eq!(result.tracks.len(), 1);

        Ok(())
    }

    #[wasm_bindgen_test]
    async fn it_resolves_to_none_on_a_fresh_install() -> TestResult {
        let reader = ShardedStoreReader::new(IndexedDbTrackDatabase::from_global()?);

        assert_eq!(reader.query(Some(&unique_user())).await, None);

        Ok(())
    }
}
