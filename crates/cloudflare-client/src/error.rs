//! Cloudflare client errors

use thiserror::Error;

/// Errors that can occur when interacting with the Cloudflare API
#[derive(Debug, Error)]
pub enum CloudflareError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Cloudflare returned a non-2xx status or `success: false`
    #[error("Cloudflare API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Token rejected (401/403)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., missing required fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CloudflareError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudflareError::NotFound(_))
    }
}
