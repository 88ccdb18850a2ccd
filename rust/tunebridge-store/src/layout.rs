use serde::Deserialize;

/// Default prefix of the per-user database name.
pub const DEFAULT_DATABASE_PREFIX: &str = "music_";

/// Schema version the page writes its cache at.
pub const DEFAULT_SCHEMA_VERSION: u32 = 6;

/// Object store holding the JSON-encoded shards.
pub const DEFAULT_TRACKS_STORE: &str = "tracks";

/// Object store holding the synchronization token.
pub const DEFAULT_INFO_STORE: &str = "info";

/// Key of the synchronization token inside the info store.
pub const DEFAULT_SYNC_TOKEN_KEY: &str = "sync_token";

/// Where the page keeps its track cache.
///
/// Every field can be overridden when deserialized; missing fields fall back
/// to the layout the page is known to use.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreLayout {
    /// Prefix joined with the user id to form the database name
    pub prefix: String,
    /// Schema version to open the database at
    pub version: u32,
    /// Name of the shard store
    pub tracks_store: String,
    /// Name of the info store
    pub info_store: String,
    /// Key of the sync token inside the info store
    pub sync_token_key: String,
}

impl StoreLayout {
    /// The database name for the given user.
    pub fn database_name(&self, user_id: &str) -> String {
        format!("{}{user_id}", self.prefix)
    }
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_DATABASE_PREFIX.to_string(),
            version: DEFAULT_SCHEMA_VERSION,
            tracks_store: DEFAULT_TRACKS_STORE.to_string(),
            info_store: DEFAULT_INFO_STORE.to_string(),
            sync_token_key: DEFAULT_SYNC_TOKEN_KEY.to_string(),
        }
    }
}
