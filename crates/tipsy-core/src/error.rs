//! Error types for tipsy-core

use thiserror::Error;

/// Result type alias using tipsy-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tipsy-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Bad user input (empty tag, zero rating, oversized image, ...)
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Operation on an id that does not exist
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// A local or remote write did not apply
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Copying an image into the durable asset directory failed
    #[error("Failed to write asset: {0}")]
    AssetWrite(String),

    /// Image compression failed
    #[error("Failed to compress image: {0}")]
    Compression(String),

    /// The operation needs a logged-in identity
    #[error("Not logged in")]
    NotAuthenticated,

    /// The user declined the authorization prompt
    #[error("Authorization was declined")]
    AuthorizationDeclined,

    /// The trusted login function did not return an identity
    #[error("Identity exchange failed: {0}")]
    IdentityExchange(String),

    /// Uploading a file to object storage failed
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Duplicate key on create
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Remote transport or API error
    #[error("Remote error: {0}")]
    Remote(String),

    /// Cloud or storage configuration is incomplete or malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::Remote(error.to_string())
    }
}

impl Error {
    /// Whether the user backed out rather than something failing.
    pub const fn is_soft_cancellation(&self) -> bool {
        matches!(self, Self::AuthorizationDeclined)
    }
}
