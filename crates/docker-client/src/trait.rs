//! ContainerSource trait for mocking

use crate::error::DockerError;
use crate::models::ContainerInfo;

/// Snapshot of running workloads.
///
/// `DockerClient` implements this; tests substitute a fixed list.
#[async_trait::async_trait]
pub trait ContainerSource: Send + Sync {
    async fn list_running_containers(&self) -> Result<Vec<ContainerInfo>, DockerError>;
}
