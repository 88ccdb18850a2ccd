use thiserror::Error;

/// The common error type used by this crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackStoreError {
    /// The page has not announced a signed-in user, so there is no database
    /// name to open
    #[error("No signed-in user is known yet")]
    UnknownUser,

    /// The database could not be opened (missing, blocked or at a newer
    /// version)
    #[error("Failed to open database '{name}': {reason}")]
    Open {
        /// Name of the database that was requested
        name: String,
        /// Underlying failure
        reason: String,
    },

    /// A transaction could not be started; usually one of the object stores
    /// does not exist yet
    #[error("Failed to start transaction: {0}")]
    Transaction(String),

    /// Reading a single value failed
    #[error("Failed to read value: {0}")]
    Read(String),

    /// The cursor over the shard store failed
    #[error("Cursor failed while reading shards: {0}")]
    Cursor(String),

    /// A shard value could not be decoded
    #[error("Malformed shard: {0}")]
    Shard(String),
}
