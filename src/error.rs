//! Error types for rbd-lineage
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur while auditing a pool
#[derive(Debug, Error)]
pub enum AuditError {
    /// The storage backend has no image by that name
    #[error("Image not found: {0}")]
    ImageNotFound(String),

    /// The rbd command could not be run or exited non-zero
    #[error("rbd command failed: {0}")]
    Command(String),

    /// Keystone rejected the credentials or returned no token
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The service catalog has no usable endpoint for a service type
    #[error("No {service} endpoint in service catalog")]
    Catalog { service: String },

    /// A service answered with an unexpected status
    #[error("{service} API error {status}: {message}")]
    Api {
        service: String,
        status: u16,
        message: String,
    },

    /// A record returned by a service lacks a field we need
    #[error("Missing field {field} on {record}")]
    MissingField { record: String, field: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;
