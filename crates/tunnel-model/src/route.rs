//! Route specs: one public hostname (and optional path) mapped to a local service.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Service used by the trailing catch-all ingress rule.
pub const FALLBACK_SERVICE: &str = "http_status:404";

/// Identity of a route. Unique across the desired set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteKey {
    pub hostname: String,
    /// Empty when the route matches every path.
    #[serde(default)]
    pub path: String,
}

impl RouteKey {
    pub fn new(hostname: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.hostname, self.path)
    }
}

/// Back-reference to the workload a spec was derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub container_id: String,
    pub container_name: String,
}

impl SourceRef {
    pub fn new(container_id: impl Into<String>, container_name: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            container_name: container_name.into(),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.container_name.is_empty() {
            write!(f, "{}", self.container_id)
        } else {
            write!(f, "{} ({})", self.container_name, self.container_id)
        }
    }
}

/// A desired ingress route.
///
/// The two origin overrides are the only origin-request fields this system
/// manages. `None` means "not requested", which clears any live value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    pub key: RouteKey,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_server_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_tls_verify: Option<bool>,
    #[serde(default)]
    pub source: SourceRef,
}

impl RouteSpec {
    pub fn new(key: RouteKey, service: impl Into<String>) -> Self {
        Self {
            key,
            service: service.into(),
            origin_server_name: None,
            no_tls_verify: None,
            source: SourceRef::default(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.key.hostname
    }

    pub fn path(&self) -> &str {
        &self.key.path
    }
}
