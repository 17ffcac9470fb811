//! Error types for the rendering pipeline

use thiserror::Error;

use crate::storage::StorageError;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering, persisting or archiving certificates
#[derive(Error, Debug)]
pub enum Error {
    /// The design document is unparseable or lacks the expected structure
    #[error("Malformed design: {0}")]
    MalformedDesign(String),

    /// The drawing surface or an encoder failed
    #[error("Rendering failed: {0}")]
    RenderFailure(String),

    /// Upload, download, delete or list failed in the storage collaborator
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The archive writer failed
    #[error("Archive error: {0}")]
    Archive(String),

    /// A top-level request is missing required fields or is not valid JSON
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error belongs to the caller's request shape rather than to
    /// a single participant's render.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::MalformedRequest(_))
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Archive(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::RenderFailure(err.to_string())
    }
}
