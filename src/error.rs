//! Custom error types for docket

use std::time::Duration;
use thiserror::Error;

/// Main error type for docket operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Persistence failed or timed out
    #[error("Storage error: {0}")]
    Storage(String),

    /// Content could not be extracted from a source file
    #[error("Error reading file: {0}")]
    Read(String),

    /// Analysis was never attempted because the content is unreadable
    #[error("{0}")]
    Skipped(String),

    #[error("Analysis timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success response from an analysis backend. The message already
    /// names the provider and model.
    #[error("{0}")]
    Backend(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Snippet not found: {0}")]
    SnippetNotFound(String),

    #[error("Unknown category: {0}")]
    InvalidCategory(String),

    #[error("Not initialized: run 'docket init' first")]
    NotInitialized,

    #[error("Already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for docket
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_messages() {
        assert_eq!(Error::Timeout(Duration::from_secs(60)).to_string(), "Analysis timed out after 60s");
        assert_eq!(
            Error::Backend("Groq Error (llama): model decommissioned".to_string()).to_string(),
            "Groq Error (llama): model decommissioned"
        );
        assert_eq!(
            Error::Read("disk fault".to_string()).to_string(),
            "Error reading file: disk fault"
        );
    }
}
