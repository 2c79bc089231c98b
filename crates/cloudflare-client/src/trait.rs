//! Capability traits for mocking
//!
//! The API is split into one narrow trait per reconciler so each consumer,
//! and each consumer's tests, depends only on the slice it uses.
//! `CloudflareClient` implements all three; `MockCloudflareClient` does too.

use crate::error::CloudflareError;
use crate::models::*;

/// Tunnel configuration (a single read-modify-write resource, last write wins)
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait TunnelConfigApi: Send + Sync {
    async fn get_tunnel_config(&self) -> Result<TunnelConfig, CloudflareError>;

    /// Replace the whole configuration.
    async fn update_tunnel_config(&self, config: &TunnelConfig) -> Result<(), CloudflareError>;
}

/// DNS zones and records
#[async_trait::async_trait]
pub trait DnsApi: Send + Sync {
    async fn list_zones(&self) -> Result<Vec<Zone>, CloudflareError>;
    async fn list_dns_records(
        &self,
        zone_id: &str,
        record_type: Option<&str>,
        name: Option<&str>,
    ) -> Result<Vec<DnsRecord>, CloudflareError>;
    async fn create_dns_record(&self, zone_id: &str, input: &DnsRecordInput) -> Result<DnsRecord, CloudflareError>;
    async fn update_dns_record(
        &self,
        zone_id: &str,
        record_id: &str,
        input: &DnsRecordInput,
    ) -> Result<DnsRecord, CloudflareError>;
    async fn delete_dns_record(&self, zone_id: &str, record_id: &str) -> Result<(), CloudflareError>;
}

/// Access applications, policies and tags. Policies are never deleted.
#[async_trait::async_trait]
pub trait AccessApi: Send + Sync {
    async fn list_access_apps(&self) -> Result<Vec<AccessApp>, CloudflareError>;
    async fn create_access_app(&self, input: &AccessAppInput) -> Result<AccessApp, CloudflareError>;
    async fn update_access_app(&self, id: &str, input: &AccessAppInput) -> Result<AccessApp, CloudflareError>;
    async fn delete_access_app(&self, id: &str) -> Result<(), CloudflareError>;

    async fn list_access_policies(&self) -> Result<Vec<AccessPolicy>, CloudflareError>;
    async fn create_access_policy(&self, input: &AccessPolicyInput) -> Result<AccessPolicy, CloudflareError>;
    async fn update_access_policy(&self, id: &str, input: &AccessPolicyInput) -> Result<AccessPolicy, CloudflareError>;

    /// Create the tag if it does not exist yet. Idempotent.
    async fn ensure_access_tag(&self, name: &str) -> Result<(), CloudflareError>;
}
