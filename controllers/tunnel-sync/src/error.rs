//! Controller-specific error types.
//!
//! Upstream client errors are wrapped; label validation problems are not
//! errors of the pass and live in `labels::LabelError`.

use cloudflare_client::CloudflareError;
use docker_client::DockerError;
use thiserror::Error;

/// Errors that can occur in the tunnel-sync controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Cloudflare API error
    #[error("Cloudflare error: {0}")]
    Cloudflare(#[from] CloudflareError),

    /// Docker API error
    #[error("Docker error: {0}")]
    Docker(#[from] DockerError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Shutdown signal handling failed
    #[error("Shutdown signal error: {0}")]
    Shutdown(#[from] std::io::Error),
}
