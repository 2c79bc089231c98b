//! Docker client errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DockerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP connection error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("Invalid request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Docker API error: {0}")]
    Api(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid DOCKER_HOST: {0}")]
    InvalidHost(String),
}
