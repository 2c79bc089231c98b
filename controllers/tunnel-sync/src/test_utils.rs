//! Test utilities for unit testing reconcilers
//!
//! Builders for containers, desired specs and live Cloudflare objects.

use cloudflare_client::{AccessApp, AccessPolicy, AccessRule, DnsRecord, PolicyRef};
use docker_client::{ContainerInfo, ContainerSource, DockerError};
use std::sync::{Arc, Mutex};
use tunnel_model::{AccessAppSpec, AccessPolicySpec, OwnershipMarker, PolicyAction, RouteKey, RouteSpec};

pub const TUNNEL_ID: &str = "tunnel-1";

pub fn marker() -> OwnershipMarker {
    OwnershipMarker::default()
}

/// Helper to create a running container with labels
pub fn container(id: &str, name: &str, labels: &[(&str, &str)]) -> ContainerInfo {
    labels
        .iter()
        .fold(ContainerInfo::new(id, name), |c, (k, v)| c.with_label(*k, *v))
}

pub fn route(hostname: &str, path: &str, service: &str) -> RouteSpec {
    RouteSpec::new(RouteKey::new(hostname, path), service)
}

/// Helper to create a proxied CNAME record with automatic TTL
pub fn cname(id: &str, name: &str, content: &str, comment: Option<&str>) -> DnsRecord {
    DnsRecord {
        id: id.to_string(),
        record_type: "CNAME".to_string(),
        name: name.to_string(),
        content: content.to_string(),
        proxied: true,
        comment: comment.map(str::to_string),
        ttl: 1,
        modified_on: None,
    }
}

/// Helper to create a live self-hosted Access app; policies get precedence by position
pub fn live_app(id: &str, name: &str, domain: &str, policy_ids: &[&str], tags: &[&str]) -> AccessApp {
    AccessApp {
        id: id.to_string(),
        name: name.to_string(),
        domain: domain.to_string(),
        app_type: "self_hosted".to_string(),
        policies: policy_ids
            .iter()
            .zip(1..)
            .map(|(id, precedence)| PolicyRef::new(*id, precedence))
            .collect(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        updated_at: None,
    }
}

/// Helper to create a live Access policy with email includes
pub fn live_policy(id: &str, name: &str, action: &str, emails: &[&str]) -> AccessPolicy {
    AccessPolicy {
        id: id.to_string(),
        name: name.to_string(),
        action: action.to_string(),
        include: emails.iter().map(|e| AccessRule::Email(e.to_string())).collect(),
        has_unsupported_rules: false,
    }
}

pub fn allow_emails(name: &str, emails: &[&str]) -> AccessPolicySpec {
    AccessPolicySpec::managed(
        name,
        PolicyAction::Allow,
        emails.iter().map(|e| e.to_string()).collect(),
        Vec::new(),
    )
}

pub fn app_spec(name: &str, domain: &str, policies: Vec<AccessPolicySpec>) -> AccessAppSpec {
    let mut spec = AccessAppSpec::new(name, domain);
    spec.policies = policies;
    spec
}

/// ContainerSource returning a fixed, replaceable container list
#[derive(Debug, Clone, Default)]
pub struct StaticContainers {
    containers: Arc<Mutex<Vec<ContainerInfo>>>,
    fail: Arc<Mutex<bool>>,
}

impl StaticContainers {
    pub fn new(containers: Vec<ContainerInfo>) -> Self {
        let source = Self::default();
        source.set(containers);
        source
    }

    pub fn set(&self, containers: Vec<ContainerInfo>) {
        *self.containers.lock().unwrap() = containers;
    }

    pub fn fail(&self) {
        *self.fail.lock().unwrap() = true;
    }
}

#[async_trait::async_trait]
impl ContainerSource for StaticContainers {
    async fn list_running_containers(&self) -> Result<Vec<ContainerInfo>, DockerError> {
        if *self.fail.lock().unwrap() {
            return Err(DockerError::Api("injected container listing failure".to_string()));
        }
        Ok(self.containers.lock().unwrap().clone())
    }
}
