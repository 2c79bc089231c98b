//! Tunnel configuration for MockCloudflareClient

use super::{MockCall, MockCloudflareClient};
use crate::error::CloudflareError;
use crate::models::*;

pub async fn get_tunnel_config(client: &MockCloudflareClient) -> Result<TunnelConfig, CloudflareError> {
    Ok(client.tunnel_config.lock().unwrap().clone())
}

pub async fn update_tunnel_config(client: &MockCloudflareClient, config: &TunnelConfig) -> Result<(), CloudflareError> {
    client.record(MockCall::UpdateTunnelConfig);
    if *client.fail_config_update.lock().unwrap() {
        return Err(CloudflareError::Api {
            status: 500,
            message: "injected tunnel configuration failure".to_string(),
        });
    }
    *client.tunnel_config.lock().unwrap() = config.clone();
    Ok(())
}
