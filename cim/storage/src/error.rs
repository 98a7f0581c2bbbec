//! Error types for storage operations

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum Error {
    /// Locator could not be turned into a URL
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// URL scheme not supported
    #[error("URL scheme not supported: {0}")]
    UnsupportedScheme(String),

    /// Object store creation failed
    #[error("Failed to create object store: {0}")]
    ObjectStoreCreation(String),

    /// Object store error
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// URL path is not a valid object path
    #[error("Invalid object path: {0}")]
    ObjectPath(#[from] object_store::path::Error),
}
