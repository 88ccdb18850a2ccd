use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::TrackStoreError;

/// One track as the page stored it. The contents are never inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackRecord(Value);

impl TrackRecord {
    /// The record as raw JSON.
    pub fn as_json(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for TrackRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// The watermark of the last synchronization the page performed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncToken(Value);

impl SyncToken {
    /// The token as raw JSON (usually a string).
    pub fn as_json(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for SyncToken {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Everything one query found in the page's cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// The sync token, or `None` when the info store has no token
    pub timestamp: Option<SyncToken>,
    /// Every record of every shard, in shard-then-entry order
    pub tracks: Vec<TrackRecord>,
}

/// A decoded shard: the records stored at one cursor position, in the order
/// a JavaScript `for...in` loop over the parsed value visits them.
#[derive(Debug, Clone, PartialEq)]
pub struct Shard(Vec<Value>);

impl Shard {
    /// Decodes the text stored at one cursor position.
    ///
    /// An object contributes its values and an array its elements. A string
    /// contributes one single-character string per UTF-16 code unit (a lone
    /// surrogate reads as U+FFFD). `null`, numbers and booleans contribute
    /// nothing. Only text that is not JSON is rejected.
    pub fn parse(text: &str) -> Result<Self, TrackStoreError> {
        let value = serde_json::from_str(text)
            .map_err(|error| TrackStoreError::Shard(error.to_string()))?;

        Ok(match value {
            Value::Object(entries) => Shard(object_values(entries)),
            Value::Array(items) => Shard(items),
            Value::String(text) => Shard(
                text.encode_utf16()
                    .map(|unit| Value::String(String::from_utf16_lossy(&[unit])))
                    .collect(),
            ),
            Value::Null | Value::Bool(_) | Value::Number(_) => Shard(Vec::new()),
        })
    }

    /// Number of records in this shard.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this shard holds no records.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the shard, yielding its records.
    pub fn into_tracks(self) -> impl Iterator<Item = TrackRecord> {
        self.0.into_iter().map(TrackRecord)
    }
}

/// Orders an object's values the way `for...in` visits its keys: array-index
/// keys in ascending numeric order first, then every other key in insertion
/// order.
fn object_values(entries: Map<String, Value>) -> Vec<Value> {
    let mut indexed = Vec::new();
    let mut named = Vec::new();

    for (key, value) in entries {
        match array_index(&key) {
            Some(index) => indexed.push((index, value)),
            None => named.push(value),
        }
    }

    indexed.sort_by_key(|(index, _)| *index);

    indexed
        .into_iter()
        .map(|(_, value)| value)
        .chain(named)
        .collect()
}

/// Returns the numeric value of a property key that JavaScript treats as an
/// array index (a canonical decimal below 2^32 - 1).
fn array_index(key: &str) -> Option<u32> {
    let index: u32 = key.parse().ok()?;
    (index < u32::MAX && index.to_string() == key).then_some(index)
}
