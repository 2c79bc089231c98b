//! Cloudflare REST API Client
//!
//! A Rust client for the subset of the Cloudflare v4 API that tunnel-sync needs:
//! Zero Trust tunnel configuration, DNS zones and records, and Access
//! applications, policies and tags.
//!
//! # Example
//!
//! ```no_run
//! use cloudflare_client::{CloudflareClient, DnsApi, TunnelConfigApi};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CloudflareClient::new(
//!     "https://api.cloudflare.com/client/v4".to_string(),
//!     "your-api-token".to_string(),
//!     "account-id".to_string(),
//!     "tunnel-id".to_string(),
//! )?;
//!
//! client.verify_token().await?;
//!
//! let config = client.get_tunnel_config().await?;
//! println!("{} ingress rules", config.ingress.len());
//!
//! for zone in client.list_zones().await? {
//!     let records = client.list_dns_records(&zone.id, Some("CNAME"), None).await?;
//!     println!("{}: {} CNAME records", zone.name, records.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Capability traits**: `TunnelConfigApi`, `DnsApi` and `AccessApi`, so each
//!   consumer depends only on the slice of the API it uses
//! - **Envelope handling**: `success`/`errors` are checked on every response
//! - **Pagination**: `result_info.total_pages` is followed for list endpoints
//! - **Mocking**: `MockCloudflareClient` behind the `test-util` feature

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod cloudflare_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::CloudflareClient;
pub use cloudflare_trait::{AccessApi, DnsApi, TunnelConfigApi};
pub use common::{ApiMessage, ApiResponse, HttpClient, ResultInfo};
pub use error::CloudflareError;
pub use models::*;
#[cfg(feature = "test-util")]
pub use mock::{MockCall, MockCloudflareClient};
