//! Access operations for MockCloudflareClient
//!
//! Handles applications, policies and tags

use super::{MockCall, MockCloudflareClient};
use crate::error::CloudflareError;
use crate::models::*;

pub async fn list_access_apps(client: &MockCloudflareClient) -> Result<Vec<AccessApp>, CloudflareError> {
    Ok(client.access_apps.lock().unwrap().clone())
}

pub async fn create_access_app(
    client: &MockCloudflareClient,
    input: &AccessAppInput,
) -> Result<AccessApp, CloudflareError> {
    client.record(MockCall::CreateAccessApp {
        name: input.name.clone(),
    });

    let app = AccessApp {
        id: client.next_id(),
        name: input.name.clone(),
        domain: input.domain.clone(),
        app_type: input.app_type.clone(),
        policies: input.policies.clone(),
        tags: input.tags.clone(),
        updated_at: Some(client.now()),
    };
    client.access_apps.lock().unwrap().push(app.clone());
    Ok(app)
}

pub async fn update_access_app(
    client: &MockCloudflareClient,
    id: &str,
    input: &AccessAppInput,
) -> Result<AccessApp, CloudflareError> {
    client.record(MockCall::UpdateAccessApp { id: id.to_string() });

    let now = client.now();
    let mut apps = client.access_apps.lock().unwrap();
    let app = apps
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| CloudflareError::NotFound(format!("Access app {} not found", id)))?;

    app.name = input.name.clone();
    app.domain = input.domain.clone();
    app.app_type = input.app_type.clone();
    app.policies = input.policies.clone();
    app.tags = input.tags.clone();
    app.updated_at = Some(now);
    Ok(app.clone())
}

pub async fn delete_access_app(client: &MockCloudflareClient, id: &str) -> Result<(), CloudflareError> {
    client.record(MockCall::DeleteAccessApp { id: id.to_string() });

    let mut apps = client.access_apps.lock().unwrap();
    let before = apps.len();
    apps.retain(|a| a.id != id);
    if apps.len() == before {
        return Err(CloudflareError::NotFound(format!("Access app {} not found", id)));
    }
    Ok(())
}

pub async fn list_access_policies(client: &MockCloudflareClient) -> Result<Vec<AccessPolicy>, CloudflareError> {
    Ok(client.access_policies.lock().unwrap().clone())
}

pub async fn create_access_policy(
    client: &MockCloudflareClient,
    input: &AccessPolicyInput,
) -> Result<AccessPolicy, CloudflareError> {
    client.record(MockCall::CreateAccessPolicy {
        name: input.name.clone(),
    });

    let policy = AccessPolicy {
        id: client.next_id(),
        name: input.name.clone(),
        action: input.action.clone(),
        include: input.include.clone(),
        has_unsupported_rules: false,
    };
    client.access_policies.lock().unwrap().push(policy.clone());
    Ok(policy)
}

pub async fn update_access_policy(
    client: &MockCloudflareClient,
    id: &str,
    input: &AccessPolicyInput,
) -> Result<AccessPolicy, CloudflareError> {
    client.record(MockCall::UpdateAccessPolicy { id: id.to_string() });

    let mut policies = client.access_policies.lock().unwrap();
    let policy = policies
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or_else(|| CloudflareError::NotFound(format!("Access policy {} not found", id)))?;

    policy.name = input.name.clone();
    policy.action = input.action.clone();
    policy.include = input.include.clone();
    policy.has_unsupported_rules = false;
    Ok(policy.clone())
}

pub async fn ensure_access_tag(client: &MockCloudflareClient, name: &str) -> Result<(), CloudflareError> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(());
    }
    if client.failing_tags.lock().unwrap().contains(name) {
        return Err(CloudflareError::Api {
            status: 500,
            message: format!("injected failure ensuring tag {}", name),
        });
    }
    if client.access_tags.lock().unwrap().contains(name) {
        return Ok(());
    }

    client.record(MockCall::CreateAccessTag {
        name: name.to_string(),
    });
    client.access_tags.lock().unwrap().insert(name.to_string());
    Ok(())
}
