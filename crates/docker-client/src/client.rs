//! Docker Engine API client

use crate::docker_trait::ContainerSource;
use crate::error::DockerError;
use crate::models::{ContainerInfo, ContainerSummary};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Host used when `DOCKER_HOST` is unset
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

#[derive(Debug, Clone)]
enum Transport {
    Unix(PathBuf),
    Http { client: Client, base_url: String },
}

/// Docker Engine API client
#[derive(Debug, Clone)]
pub struct DockerClient {
    transport: Transport,
    api_version: Option<String>,
}

impl DockerClient {
    /// Create a new Docker client
    ///
    /// # Arguments
    /// * `host` - `unix:///path`, `tcp://host:port` or `http(s)://host:port`; defaults to the local socket
    /// * `api_version` - Engine API version (e.g., "1.43"); unversioned paths when `None`
    pub fn new(host: Option<&str>, api_version: Option<&str>) -> Result<Self, DockerError> {
        let host = host.map(str::trim).filter(|h| !h.is_empty()).unwrap_or(DEFAULT_DOCKER_HOST);

        let transport = if let Some(path) = host.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(DockerError::InvalidHost(host.to_string()));
            }
            Transport::Unix(PathBuf::from(path))
        } else {
            let base_url = if let Some(rest) = host.strip_prefix("tcp://") {
                format!("http://{}", rest)
            } else if host.starts_with("http://") || host.starts_with("https://") {
                host.to_string()
            } else {
                return Err(DockerError::InvalidHost(host.to_string()));
            };
            let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
            Transport::Http {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
            }
        };

        let api_version = api_version
            .map(|v| v.trim().trim_start_matches('v').to_string())
            .filter(|v| !v.is_empty());

        Ok(Self { transport, api_version })
    }

    /// Build an API path, prefixed with `/v<version>` when a version is pinned
    pub fn api_path(&self, path: &str) -> String {
        match &self.api_version {
            Some(version) => format!("/v{}{}", version, path),
            None => path.to_string(),
        }
    }

    async fn get_json(&self, path: &str) -> Result<Vec<u8>, DockerError> {
        let path = self.api_path(path);
        match &self.transport {
            Transport::Http { client, base_url } => {
                let url = format!("{}{}", base_url, path);
                debug!("GET {}", url);
                let response = client
                    .get(&url)
                    .header("Accept", "application/json")
                    .send()
                    .await?;
                let status = response.status();
                let body = response.bytes().await?;
                if !status.is_success() {
                    return Err(DockerError::Api(format!(
                        "GET {} failed: {} - {}",
                        path,
                        status,
                        String::from_utf8_lossy(&body)
                    )));
                }
                Ok(body.to_vec())
            }
            Transport::Unix(socket) => get_over_unix_socket(socket, &path).await,
        }
    }
}

#[cfg(unix)]
async fn get_over_unix_socket(socket: &std::path::Path, path: &str) -> Result<Vec<u8>, DockerError> {
    use http_body_util::{BodyExt, Empty};
    use hyper::body::Bytes;
    use hyper_util::rt::TokioIo;

    debug!("GET unix://{}{}", socket.display(), path);
    let stream = tokio::net::UnixStream::connect(socket).await?;
    let io = TokioIo::new(stream);

    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!("Docker socket connection closed with error: {}", e);
        }
    });

    let request = hyper::Request::builder()
        .method("GET")
        .uri(path)
        .header("Host", "docker")
        .header("Accept", "application/json")
        .body(Empty::<Bytes>::new())?;

    let response = sender.send_request(request).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();

    if !status.is_success() {
        return Err(DockerError::Api(format!(
            "GET {} failed: {} - {}",
            path,
            status,
            String::from_utf8_lossy(&body)
        )));
    }
    Ok(body.to_vec())
}

#[cfg(not(unix))]
async fn get_over_unix_socket(socket: &std::path::Path, _path: &str) -> Result<Vec<u8>, DockerError> {
    Err(DockerError::InvalidHost(format!(
        "unix://{} (unix sockets are not supported on this platform)",
        socket.display()
    )))
}

#[async_trait::async_trait]
impl ContainerSource for DockerClient {
    /// Lists running containers only (`all=false`)
    async fn list_running_containers(&self) -> Result<Vec<ContainerInfo>, DockerError> {
        let body = self.get_json("/containers/json").await?;
        let summaries: Vec<ContainerSummary> = serde_json::from_slice(&body)?;
        debug!("Docker reported {} running containers", summaries.len());
        Ok(summaries.into_iter().map(ContainerInfo::from).collect())
    }
}
