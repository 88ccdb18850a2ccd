#![warn(missing_docs)]

//! This crate reads the track cache that a music web page keeps in its own
//! IndexedDB database.
//!
//! The page stores its library as a set of shards: every position of the
//! `tracks` object store holds a JSON-encoded mapping of local identifiers to
//! track records, and the `info` object store holds the synchronization token
//! that was current when the shards were written. [ShardedStoreReader] opens
//! that database, reads the token and walks the shards inside one read-only
//! transaction, and flattens everything into a [QueryResult].
//!
//! Access to the database goes through the [TrackDatabase] family of traits,
//! so the same reader runs against the browser's IndexedDB (on
//! `wasm32-unknown-unknown`) and against [MemoryTrackDatabase] everywhere
//! else:
//!
//! ```rust
//! # async fn example() -> Option<()> {
//! use serde_json::json;
//! use tunebridge_store::{MemoryTrackDatabase, ShardedStoreReader, StoreLayout};
//!
//! let database = MemoryTrackDatabase::default();
//! let layout = StoreLayout::default();
//! let name = layout.database_name("1234");
//!
//! database.create(&name, layout.version, &["tracks", "info"]);
//! database.put(&name, "info", "sync_token", json!("tok123"));
//! database.put(&name, "tracks", "0", json!(r#"{"a":{"id":1}}"#));
//!
//! let reader = ShardedStoreReader::new(database);
//! let result = reader.query(Some("1234")).await?;
//!
//! assert_eq!(result.tracks.len(), 1);
//! # Some(())
//! # }
//! ```
//!
//! Failures never escape [ShardedStoreReader::query]: they are handed to a
//! [Reporter] and the query resolves to `None`.

mod backend;
pub use backend::*;

mod diagnostics;
pub use diagnostics::*;

mod error;
pub use error::*;

mod layout;
pub use layout::*;

mod reader;
pub use reader::*;

mod record;
pub use record::*;

#[cfg(any(test, feature = "helpers"))]
mod helpers;
#[cfg(any(test, feature = "helpers"))]
pub use helpers::*;
