use thiserror::Error;

/// Errors raised while bridging between the page, the content script and the
/// background process
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    /// A message (or configuration) could not be encoded or decoded
    #[error("Failed to (de)serialize message: {0}")]
    Serialization(String),

    /// Code could not be run in the page's context
    #[error("Failed to inject script: {0}")]
    Injection(String),

    /// A message could not be handed to the background process
    #[error("Failed to reach the background process: {0}")]
    Background(String),

    /// A browser API the content script relies on is missing
    #[error("Browser API unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for ContentError {
    fn from(error: serde_json::Error) -> Self {
        ContentError::Serialization(error.to_string())
    }
}
