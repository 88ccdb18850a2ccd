use serde::Deserialize;
use tunebridge_store::StoreLayout;

use crate::{ContentError, ProbeConfig};

/// Everything the content script needs to know about the page it runs on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Where the page keeps its track cache
    pub store: StoreLayout,
    /// Where the page keeps the signed-in user's identity
    pub probe: ProbeConfig,
}

impl BridgeConfig {
    /// Reads a configuration, keeping the defaults for anything it leaves
    /// out.
    pub fn from_json(text: &str) -> Result<Self, ContentError> {
        Ok(serde_json::from_str(text)?)
    }
}
