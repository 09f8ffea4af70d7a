//! Store error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while talking to the preview server or preparing artifacts
#[derive(Debug, Error)]
pub enum StoreError {
    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API error from the server
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Rate limited by the server
    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Artifact is missing, unreadable or of an unsupported kind
    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    /// A chunk PUT to a signed URL failed
    #[error("Upload of part {part_number} failed: {message}")]
    PartUploadFailed { part_number: u32, message: String },

    /// Signed URL accepted the chunk but returned no ETag
    #[error("Upload of part {part_number} returned no ETag")]
    MissingEtag { part_number: u32 },

    /// No embedded build UUID in a compiled Apple binary
    #[error("Binary id not found for {}", .0.display())]
    BinaryIdNotFound(PathBuf),

    /// `aapt2 dump badging` output lacks a required field
    #[error("Could not read APK metadata: {0}")]
    ApkMetadata(String),

    /// Malformed preview deep link
    #[error("Invalid preview URL: {0}")]
    InvalidPreviewUrl(String),

    /// Search returned nothing
    #[error("Preview not found: {0}")]
    PreviewNotFound(String),

    /// No `account/project` handle available
    #[error("Missing full handle; pass --handle or set full_handle in flightdeck.toml")]
    MissingFullHandle,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Tool not found
    #[error("Required tool not found: {0}")]
    ToolNotFound(String),

    /// Command execution failed
    #[error("Command failed: {command}: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Zip archive error
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Property list error
    #[error("Info.plist error: {0}")]
    Plist(#[from] plist::Error),

    /// Git error
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Error from the core crate
    #[error(transparent)]
    Core(#[from] flightdeck_core::FlightdeckError),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Whether repeating the whole operation may succeed.
    ///
    /// Network-level failures, rate limiting and server-side errors qualify.
    /// Client errors and local artifact problems never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_builder() && !e.is_decode(),
            Self::RateLimited { .. } => true,
            Self::ApiError { status, .. } => *status >= 500 || *status == 408,
            Self::PartUploadFailed { .. } | Self::MissingEtag { .. } => true,
            _ => false,
        }
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
