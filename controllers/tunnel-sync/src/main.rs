//! Tunnel Sync Controller
//!
//! Polls the local Docker engine and reconciles container labels into:
//! - Cloudflare tunnel ingress rules
//! - Proxied CNAME records pointing at the tunnel
//! - Cloudflare Access applications and their policies
//!
//! Every Cloudflare write is gated by a per-resource management flag and the
//! global dry-run switch.

mod config;
mod controller;
#[cfg(test)]
mod controller_test;
mod error;
mod labels;
mod origin_request;
mod reconcile_helpers;
#[cfg(test)]
mod reconcile_helpers_test;
mod reconciler;
#[cfg(test)]
mod test_utils;

use crate::config::Config;
use crate::error::ControllerError;
use cloudflare_client::CloudflareClient;
use controller::Controller;
use docker_client::DockerClient;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Tunnel Sync Controller");
    info!("Configuration:");
    info!("  Docker host: {}", config.docker.host.as_deref().unwrap_or("unix:///var/run/docker.sock"));
    info!("  Cloudflare API: {}", config.cloudflare.base_url);
    info!("  Account: {}", config.cloudflare.account_id);
    info!("  Tunnel: {}", config.cloudflare.tunnel_id);
    info!("  Poll interval: {:?}", config.controller.poll_interval);
    info!("  Run once: {}", config.controller.run_once);
    info!("  Dry run: {}", config.controller.dry_run);
    info!("  Manage tunnel: {}", config.controller.manage_tunnel);
    info!("  Manage DNS: {} (delete: {})", config.controller.manage_dns, config.controller.delete_dns);
    info!("  Manage Access: {}", config.controller.manage_access);
    info!("  Managed by: {}", config.controller.managed_by);

    let cloudflare = CloudflareClient::new(
        config.cloudflare.base_url.clone(),
        config.cloudflare.api_token.clone(),
        config.cloudflare.account_id.clone(),
        config.cloudflare.tunnel_id.clone(),
    )?;

    info!("Validating Cloudflare token and connectivity...");
    if let Err(e) = cloudflare.verify_token().await {
        error!("Failed to validate Cloudflare token: {}", e);
        error!("Please ensure:");
        error!("  1. CF_API_TOKEN is set to an active API token");
        error!("  2. The token can edit tunnels, DNS and Access for account {}", config.cloudflare.account_id);
        error!("  3. The Cloudflare API is reachable at {}", config.cloudflare.base_url);
        return Err(e.into());
    }
    info!("Cloudflare token validated");

    let docker = DockerClient::new(config.docker.host.as_deref(), config.docker.api_version.as_deref())?;

    let controller = Controller::new(docker, cloudflare, &config.cloudflare.tunnel_id, &config.controller);
    controller.run().await?;

    info!("Tunnel Sync Controller stopped");
    Ok(())
}
