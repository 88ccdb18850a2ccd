//! Test doubles for code that sits on top of a [TrackDatabase].

use std::{cell::RefCell, rc::Rc};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    ReadTransaction, Reporter, ShardCursor, TrackConnection, TrackDatabase, TrackStoreError,
};

/// Which step of a read a [FlakyTrackDatabase] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Nothing fails
    None,
    /// Opening the database fails
    Open,
    /// Every single-value read fails
    Read,
    /// The cursor fails after yielding this many shards
    CursorAfter(usize),
}

type Hook = Rc<dyn Fn()>;

/// Wraps another [TrackDatabase] and injects a [Fault] into it.
///
/// A hook can also be registered to run every time a cursor advances, which
/// lets tests mutate the wrapped database in the middle of a traversal.
#[derive(Clone)]
pub struct FlakyTrackDatabase<D> {
    inner: D,
    fault: Fault,
    on_cursor_step: Option<Hook>,
}

impl<D> FlakyTrackDatabase<D>
where
    D: TrackDatabase,
{
    /// Wraps `inner`, failing at `fault`.
    pub fn new(inner: D, fault: Fault) -> Self {
        Self {
            inner,
            fault,
            on_cursor_step: None,
        }
    }

    /// Runs `hook` before every cursor step.
    pub fn on_cursor_step<F>(mut self, hook: F) -> Self
    where
        F: Fn() + 'static,
    {
        self.on_cursor_step = Some(Rc::new(hook));
        self
    }
}

#[async_trait(?Send)]
impl<D> TrackDatabase for FlakyTrackDatabase<D>
where
    D: TrackDatabase,
{
    type Connection = FlakyConnection<D::Connection>;

    async fn open(&self, name: &str, version: u32) -> Result<Self::Connection, TrackStoreError> {
        if self.fault == Fault::Open {
            return Err(TrackStoreError::Open {
                name: name.to_string(),
                reason: "injected fault".to_string(),
            });
        }

        Ok(FlakyConnection {
            inner: self.inner.open(name, version).await?,
            fault: self.fault,
            on_cursor_step: self.on_cursor_step.clone(),
        })
    }
}

/// Connection half of a [FlakyTrackDatabase].
pub struct FlakyConnection<C> {
    inner: C,
    fault: Fault,
    on_cursor_step: Option<Hook>,
}

impl<C> TrackConnection for FlakyConnection<C>
where
    C: TrackConnection,
{
    type Transaction = FlakyTransaction<C::Transaction>;

    fn read_only(&self, stores: &[&str]) -> Result<Self::Transaction, TrackStoreError> {
        Ok(FlakyTransaction {
            inner: self.inner.read_only(stores)?,
            fault: self.fault,
            on_cursor_step: self.on_cursor_step.clone(),
        })
    }
}

/// Transaction half of a [FlakyTrackDatabase].
pub struct FlakyTransaction<T> {
    inner: T,
    fault: Fault,
    on_cursor_step: Option<Hook>,
}

#[async_trait(?Send)]
impl<T> ReadTransaction for FlakyTransaction<T>
where
    T: ReadTransaction,
{
    type Cursor = FlakyCursor<T::Cursor>;

    async fn get(&self, store: &str, key: &str) -> Result<Option<Value>, TrackStoreError> {
        if self.fault == Fault::Read {
            return Err(TrackStoreError::Read(format!(
                "injected fault reading '{key}' from '{store}'"
            )));
        }
        self.inner.get(store, key).await
    }

    fn open_cursor(&self, store: &str) -> Result<Self::Cursor, TrackStoreError> {
        let fail_after = match self.fault {
            Fault::CursorAfter(count) => Some(count),
            _ => None,
        };

        Ok(FlakyCursor {
            inner: self.inner.open_cursor(store)?,
            fail_after,
            yielded: 0,
            on_cursor_step: self.on_cursor_step.clone(),
        })
    }
}

/// Cursor half of a [FlakyTrackDatabase].
pub struct FlakyCursor<C> {
    inner: C,
    fail_after: Option<usize>,
    yielded: usize,
    on_cursor_step: Option<Hook>,
}

#[async_trait(?Send)]
impl<C> ShardCursor for FlakyCursor<C>
where
    C: ShardCursor,
{
    async fn next(&mut self) -> Result<Option<String>, TrackStoreError> {
        if let Some(hook) = &self.on_cursor_step {
            hook();
        }

        if self.fail_after == Some(self.yielded) {
            return Err(TrackStoreError::Cursor(format!(
                "injected fault after {} shards",
                self.yielded
            )));
        }

        let shard = self.inner.next().await?;
        if shard.is_some() {
            self.yielded += 1;
        }
        Ok(shard)
    }
}

/// A [Reporter] that remembers everything it was handed.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    reports: Rc<RefCell<Vec<TrackStoreError>>>,
}

impl RecordingReporter {
    /// Everything reported so far, oldest first.
    pub fn reports(&self) -> Vec<TrackStoreError> {
        self.reports.borrow().clone()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, error: &TrackStoreError) {
        self.reports.borrow_mut().push(error.clone());
    }
}
