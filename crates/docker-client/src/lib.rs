//! Docker Engine API Client
//!
//! Read-only client that lists running containers and their labels.
//!
//! **Transports:** `unix://` sockets (default), `tcp://` and `http(s)://` endpoints.

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod docker_trait;

pub use client::*;
pub use docker_trait::ContainerSource;
pub use error::*;
pub use models::*;
