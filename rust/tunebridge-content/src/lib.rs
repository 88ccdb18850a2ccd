#![warn(missing_docs)]

//! Content script bridging a music web page and its browser extension.
//!
//! The script runs in the page's origin but in an isolated world, so it sees
//! the page's IndexedDB but none of its JavaScript globals. It does two
//! things:
//!
//! - answers `getLocalTracks` requests from the background process by reading
//!   the page's track cache through [tunebridge_store::ShardedStoreReader],
//! - relays the signed-in user's identity and session token from the page to
//!   the background process, once at load and again on every `getXsrf`.
//!
//! ```text
//! ┌──────────────┐ postMessage ┌──────────────────┐ sendMessage ┌────────────┐
//! │ page world   │────────────▸│ content script   │────────────▸│ background │
//! │ (probe)      │             │ IdentityRelay    │             │            │
//! │              │◂────────────│ RequestRouter    │◂────────────│            │
//! └──────────────┘   inject    └──────────────────┘  onMessage  └────────────┘
//!                                      │
//!                                      ▼
//!                                  IndexedDB
//! ```
//!
//! Everything except the browser glue (the `web` module, `ScriptInjector`
//! and `ChromeRuntime`, all built for `wasm32-unknown-unknown` only) is
//! platform independent and tested natively.

mod background;
pub use background::*;

mod config;
pub use config::*;

mod error;
pub use error::*;

mod identity;
pub use identity::*;

mod inject;
pub use inject::*;

mod location;
pub use location::*;

mod probe;
pub use probe::*;

mod protocol;
pub use protocol::*;

mod router;
pub use router::*;

mod session;
pub use session::*;

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
pub mod web;

#[cfg(any(test, feature = "helpers"))]
mod helpers;
#[cfg(any(test, feature = "helpers"))]
pub use helpers::*;
