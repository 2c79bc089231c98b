//! Cloudflare API client
//!
//! Implements the Cloudflare v4 REST API for tunnel configuration, DNS and Access.
//! Account-scoped endpoints live under `/accounts/{account_id}/...`, DNS under `/zones/...`.

use crate::cloudflare_trait::{AccessApi, DnsApi, TunnelConfigApi};
use crate::common::HttpClient;
use crate::error::CloudflareError;
use crate::models::*;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

const ZONES_PER_PAGE: u32 = 50;
const RECORDS_PER_PAGE: u32 = 100;

/// Cloudflare API client bound to one account and one tunnel
#[derive(Debug, Clone)]
pub struct CloudflareClient {
    http: HttpClient,
    account_id: String,
    tunnel_id: String,
}

#[derive(Debug, Deserialize)]
struct TokenStatus {
    #[serde(default)]
    status: String,
}

impl CloudflareClient {
    /// Create a new Cloudflare client
    ///
    /// # Arguments
    /// * `base_url` - API base URL (e.g., "https://api.cloudflare.com/client/v4")
    /// * `token` - API token for bearer authentication
    /// * `account_id` - Account owning the tunnel and Access resources
    /// * `tunnel_id` - Tunnel whose configuration is managed
    pub fn new(
        base_url: String,
        token: String,
        account_id: String,
        tunnel_id: String,
    ) -> Result<Self, CloudflareError> {
        if account_id.trim().is_empty() || tunnel_id.trim().is_empty() {
            return Err(CloudflareError::InvalidRequest(
                "account ID and tunnel ID are required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(CloudflareError::Http)?;

        let base_url = if base_url.trim().is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            base_url
        };

        Ok(Self {
            http: HttpClient::new(client, base_url, token),
            account_id,
            tunnel_id,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn tunnel_id(&self) -> &str {
        &self.tunnel_id
    }

    /// Validate the API token.
    ///
    /// Calls `/user/tokens/verify`, which succeeds for any valid token regardless
    /// of its permissions.
    ///
    /// # Returns
    /// * `Ok(())` - Token is active and the API is reachable
    /// * `Err(CloudflareError)` - Token is invalid, inactive, or the API is unreachable
    pub async fn verify_token(&self) -> Result<(), CloudflareError> {
        debug!("Validating Cloudflare token and connectivity");
        let status: TokenStatus = self.http.get("/user/tokens/verify").await?;
        if status.status != "active" {
            return Err(CloudflareError::Authentication(format!(
                "token status is {:?}, expected \"active\"",
                status.status
            )));
        }
        debug!("Token validated successfully");
        Ok(())
    }

    fn config_path(&self) -> String {
        format!(
            "/accounts/{}/cfd_tunnel/{}/configurations",
            self.account_id, self.tunnel_id
        )
    }

    fn access_path(&self, resource: &str) -> String {
        format!("/accounts/{}/access/{}", self.account_id, resource)
    }

    fn dns_records_path(zone_id: &str) -> String {
        format!("/zones/{}/dns_records", urlencoding::encode(zone_id))
    }
}

#[async_trait::async_trait]
impl TunnelConfigApi for CloudflareClient {
    async fn get_tunnel_config(&self) -> Result<TunnelConfig, CloudflareError> {
        let result: TunnelConfigurationResult = self.http.get(&self.config_path()).await?;
        debug!(
            "Fetched tunnel {} configuration (version {:?}): {} ingress rules",
            self.tunnel_id,
            result.version,
            result.config.ingress.len()
        );
        Ok(result.config)
    }

    async fn update_tunnel_config(&self, config: &TunnelConfig) -> Result<(), CloudflareError> {
        let body = serde_json::json!({ "config": serde_json::to_value(config)? });
        let _: serde_json::Value = self.http.put(&self.config_path(), &body).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl DnsApi for CloudflareClient {
    async fn list_zones(&self) -> Result<Vec<Zone>, CloudflareError> {
        self.http
            .fetch_all_pages("/zones", &[("account.id", self.account_id.as_str())], ZONES_PER_PAGE)
            .await
    }

    async fn list_dns_records(
        &self,
        zone_id: &str,
        record_type: Option<&str>,
        name: Option<&str>,
    ) -> Result<Vec<DnsRecord>, CloudflareError> {
        let mut filters = Vec::new();
        if let Some(record_type) = record_type.filter(|t| !t.is_empty()) {
            filters.push(("type", record_type));
        }
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            filters.push(("name", name));
        }
        self.http
            .fetch_all_pages(&Self::dns_records_path(zone_id), &filters, RECORDS_PER_PAGE)
            .await
    }

    async fn create_dns_record(&self, zone_id: &str, input: &DnsRecordInput) -> Result<DnsRecord, CloudflareError> {
        let body = serde_json::to_value(input)?;
        self.http.post(&Self::dns_records_path(zone_id), &body).await
    }

    async fn update_dns_record(
        &self,
        zone_id: &str,
        record_id: &str,
        input: &DnsRecordInput,
    ) -> Result<DnsRecord, CloudflareError> {
        let body = serde_json::to_value(input)?;
        let path = format!("{}/{}", Self::dns_records_path(zone_id), urlencoding::encode(record_id));
        self.http.put(&path, &body).await
    }

    async fn delete_dns_record(&self, zone_id: &str, record_id: &str) -> Result<(), CloudflareError> {
        let path = format!("{}/{}", Self::dns_records_path(zone_id), urlencoding::encode(record_id));
        self.http.delete(&path).await
    }
}

#[async_trait::async_trait]
impl AccessApi for CloudflareClient {
    async fn list_access_apps(&self) -> Result<Vec<AccessApp>, CloudflareError> {
        self.http
            .fetch_all_pages(&self.access_path("apps"), &[], RECORDS_PER_PAGE)
            .await
    }

    async fn create_access_app(&self, input: &AccessAppInput) -> Result<AccessApp, CloudflareError> {
        let body = serde_json::to_value(input)?;
        self.http.post(&self.access_path("apps"), &body).await
    }

    async fn update_access_app(&self, id: &str, input: &AccessAppInput) -> Result<AccessApp, CloudflareError> {
        let body = serde_json::to_value(input)?;
        let path = format!("{}/{}", self.access_path("apps"), urlencoding::encode(id));
        self.http.put(&path, &body).await
    }

    async fn delete_access_app(&self, id: &str) -> Result<(), CloudflareError> {
        let path = format!("{}/{}", self.access_path("apps"), urlencoding::encode(id));
        self.http.delete(&path).await
    }

    async fn list_access_policies(&self) -> Result<Vec<AccessPolicy>, CloudflareError> {
        self.http
            .fetch_all_pages(&self.access_path("policies"), &[], RECORDS_PER_PAGE)
            .await
    }

    async fn create_access_policy(&self, input: &AccessPolicyInput) -> Result<AccessPolicy, CloudflareError> {
        self.http.post(&self.access_path("policies"), &input.to_json()).await
    }

    async fn update_access_policy(&self, id: &str, input: &AccessPolicyInput) -> Result<AccessPolicy, CloudflareError> {
        let path = format!("{}/{}", self.access_path("policies"), urlencoding::encode(id));
        self.http.put(&path, &input.to_json()).await
    }

    async fn ensure_access_tag(&self, name: &str) -> Result<(), CloudflareError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(());
        }

        let path = format!("{}/{}", self.access_path("tags"), urlencoding::encode(name));
        match self.http.get::<AccessTag>(&path).await {
            Ok(tag) if !tag.name.is_empty() => return Ok(()),
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        debug!("Creating Access tag {}", name);
        let body = serde_json::json!({ "name": name });
        let _: AccessTag = self.http.post(&self.access_path("tags"), &body).await?;
        Ok(())
    }
}
