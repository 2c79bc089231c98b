//! Mock CloudflareClient for unit testing
//!
//! This module provides an in-memory implementation of the capability traits
//! that can be used in unit tests without a Cloudflare account.
//!
//! The mock is organized into domain-specific modules:
//! - `tunnel.rs` - Tunnel configuration
//! - `dns.rs` - Zones and DNS records
//! - `access.rs` - Access applications, policies and tags
//!
//! Every mutating call is appended to a call log (see [`MockCall`]), so tests
//! can assert exactly which writes a reconcile pass issued.

mod access;
mod dns;
mod tunnel;

use crate::cloudflare_trait::{AccessApi, DnsApi, TunnelConfigApi};
use crate::error::CloudflareError;
use crate::models::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// A mutating call received by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    UpdateTunnelConfig,
    CreateDnsRecord { zone_id: String, name: String },
    UpdateDnsRecord { zone_id: String, record_id: String },
    DeleteDnsRecord { zone_id: String, record_id: String },
    CreateAccessApp { name: String },
    UpdateAccessApp { id: String },
    DeleteAccessApp { id: String },
    CreateAccessPolicy { name: String },
    UpdateAccessPolicy { id: String },
    CreateAccessTag { name: String },
}

/// Mock CloudflareClient for testing
///
/// Clones share state, so a test can hand one clone to a reconciler and
/// inspect the other afterwards.
#[derive(Clone, Default)]
pub struct MockCloudflareClient {
    pub(crate) tunnel_config: Arc<Mutex<TunnelConfig>>,
    pub(crate) zones: Arc<Mutex<Vec<Zone>>>,
    // zone ID -> records
    pub(crate) dns_records: Arc<Mutex<HashMap<String, Vec<DnsRecord>>>>,
    pub(crate) access_apps: Arc<Mutex<Vec<AccessApp>>>,
    pub(crate) access_policies: Arc<Mutex<Vec<AccessPolicy>>>,
    pub(crate) access_tags: Arc<Mutex<BTreeSet<String>>>,
    // Failure injection
    pub(crate) failing_tags: Arc<Mutex<HashSet<String>>>,
    pub(crate) failing_record_zones: Arc<Mutex<HashSet<String>>>,
    pub(crate) fail_config_update: Arc<Mutex<bool>>,
    pub(crate) calls: Arc<Mutex<Vec<MockCall>>>,
}

impl std::fmt::Debug for MockCloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCloudflareClient").finish_non_exhaustive()
    }
}

impl MockCloudflareClient {
    /// Create a new, empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tunnel ingress rules (for test setup)
    pub fn set_ingress(&self, ingress: Vec<IngressRule>) {
        self.tunnel_config.lock().unwrap().ingress = ingress;
    }

    /// Replace the whole tunnel configuration (for test setup)
    pub fn set_tunnel_config(&self, config: TunnelConfig) {
        *self.tunnel_config.lock().unwrap() = config;
    }

    /// Current tunnel configuration
    pub fn tunnel_config(&self) -> TunnelConfig {
        self.tunnel_config.lock().unwrap().clone()
    }

    /// Add a zone to the mock store (for test setup)
    pub fn add_zone(&self, zone: Zone) {
        self.zones.lock().unwrap().push(zone);
    }

    /// Add a DNS record to a zone (for test setup)
    pub fn add_dns_record(&self, zone_id: &str, record: DnsRecord) {
        self.dns_records
            .lock()
            .unwrap()
            .entry(zone_id.to_string())
            .or_default()
            .push(record);
    }

    /// Records currently stored for a zone
    pub fn dns_records(&self, zone_id: &str) -> Vec<DnsRecord> {
        self.dns_records
            .lock()
            .unwrap()
            .get(zone_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Add an Access app to the mock store (for test setup)
    pub fn add_access_app(&self, app: AccessApp) {
        self.access_apps.lock().unwrap().push(app);
    }

    pub fn access_apps(&self) -> Vec<AccessApp> {
        self.access_apps.lock().unwrap().clone()
    }

    /// Add an Access policy to the mock store (for test setup)
    pub fn add_access_policy(&self, policy: AccessPolicy) {
        self.access_policies.lock().unwrap().push(policy);
    }

    pub fn access_policies(&self) -> Vec<AccessPolicy> {
        self.access_policies.lock().unwrap().clone()
    }

    /// Add an Access tag to the mock store (for test setup)
    pub fn add_access_tag(&self, name: &str) {
        self.access_tags.lock().unwrap().insert(name.to_string());
    }

    pub fn access_tags(&self) -> Vec<String> {
        self.access_tags.lock().unwrap().iter().cloned().collect()
    }

    /// Make `ensure_access_tag(name)` fail
    pub fn fail_access_tag(&self, name: &str) {
        self.failing_tags.lock().unwrap().insert(name.to_string());
    }

    /// Make `list_dns_records` fail for one zone
    pub fn fail_dns_records(&self, zone_id: &str) {
        self.failing_record_zones.lock().unwrap().insert(zone_id.to_string());
    }

    /// Make `update_tunnel_config` fail
    pub fn fail_tunnel_config_update(&self) {
        *self.fail_config_update.lock().unwrap() = true;
    }

    /// Every mutating call received so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of mutating calls received so far
    pub fn mutation_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Forget recorded calls (state is kept)
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub(crate) fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    /// Generate a new resource ID
    pub(crate) fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub(crate) fn now(&self) -> String {
        chrono::Utc::now().to_rfc3339()
    }
}

#[async_trait::async_trait]
impl TunnelConfigApi for MockCloudflareClient {
    async fn get_tunnel_config(&self) -> Result<TunnelConfig, CloudflareError> {
        tunnel::get_tunnel_config(self).await
    }

    async fn update_tunnel_config(&self, config: &TunnelConfig) -> Result<(), CloudflareError> {
        tunnel::update_tunnel_config(self, config).await
    }
}

#[async_trait::async_trait]
impl DnsApi for MockCloudflareClient {
    async fn list_zones(&self) -> Result<Vec<Zone>, CloudflareError> {
        dns::list_zones(self).await
    }

    async fn list_dns_records(
        &self,
        zone_id: &str,
        record_type: Option<&str>,
        name: Option<&str>,
    ) -> Result<Vec<DnsRecord>, CloudflareError> {
        dns::list_dns_records(self, zone_id, record_type, name).await
    }

    async fn create_dns_record(&self, zone_id: &str, input: &DnsRecordInput) -> Result<DnsRecord, CloudflareError> {
        dns::create_dns_record(self, zone_id, input).await
    }

    async fn update_dns_record(
        &self,
        zone_id: &str,
        record_id: &str,
        input: &DnsRecordInput,
    ) -> Result<DnsRecord, CloudflareError> {
        dns::update_dns_record(self, zone_id, record_id, input).await
    }

    async fn delete_dns_record(&self, zone_id: &str, record_id: &str) -> Result<(), CloudflareError> {
        dns::delete_dns_record(self, zone_id, record_id).await
    }
}

#[async_trait::async_trait]
impl AccessApi for MockCloudflareClient {
    async fn list_access_apps(&self) -> Result<Vec<AccessApp>, CloudflareError> {
        access::list_access_apps(self).await
    }

    async fn create_access_app(&self, input: &AccessAppInput) -> Result<AccessApp, CloudflareError> {
        access::create_access_app(self, input).await
    }

    async fn update_access_app(&self, id: &str, input: &AccessAppInput) -> Result<AccessApp, CloudflareError> {
        access::update_access_app(self, id, input).await
    }

    async fn delete_access_app(&self, id: &str) -> Result<(), CloudflareError> {
        access::delete_access_app(self, id).await
    }

    async fn list_access_policies(&self) -> Result<Vec<AccessPolicy>, CloudflareError> {
        access::list_access_policies(self).await
    }

    async fn create_access_policy(&self, input: &AccessPolicyInput) -> Result<AccessPolicy, CloudflareError> {
        access::create_access_policy(self, input).await
    }

    async fn update_access_policy(&self, id: &str, input: &AccessPolicyInput) -> Result<AccessPolicy, CloudflareError> {
        access::update_access_policy(self, id, input).await
    }

    async fn ensure_access_tag(&self, name: &str) -> Result<(), CloudflareError> {
        access::ensure_access_tag(self, name).await
    }
}
