//! Tunnel ingress reconciler
//!
//! The tunnel configuration is a single document: the controller reads it,
//! rebuilds the `ingress` list from the desired routes and writes the whole
//! document back when the list differs. Hostname rules come first, sorted by
//! (hostname, path), followed by exactly one catch-all rule.

use super::Gate;
use crate::error::ControllerError;
use crate::origin_request;
use cloudflare_client::{IngressRule, TunnelConfigApi};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};
use tunnel_model::{FALLBACK_SERVICE, RouteKey, RouteSpec};

/// Outcome of one ingress pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngressSummary {
    /// Rules in the rebuilt list, catch-all included
    pub desired: usize,
    pub existing: usize,
    pub removed: usize,
    pub written: bool,
}

/// Rebuilt ingress list plus the live rules it drops
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngressPlan {
    pub rules: Vec<IngressRule>,
    pub removed: Vec<IngressRule>,
}

fn rule_key(rule: &IngressRule) -> RouteKey {
    RouteKey::new(rule.hostname.clone(), rule.path.clone())
}

fn is_catch_all(rule: &IngressRule) -> bool {
    rule.hostname.is_empty() && rule.service == FALLBACK_SERVICE
}

/// Compute the ingress list for `desired` given the live rules.
///
/// `desired` must not contain two routes with the same key; label parsing
/// already drops duplicates.
pub fn plan_ingress(desired: &[RouteSpec], existing: &[IngressRule]) -> IngressPlan {
    let mut existing_by_key: BTreeMap<RouteKey, &IngressRule> = BTreeMap::new();
    let mut catch_all: Option<&IngressRule> = None;

    for rule in existing {
        if is_catch_all(rule) {
            catch_all.get_or_insert(rule);
            continue;
        }
        if rule.hostname.is_empty() {
            warn!(
                "Existing ingress rule without hostname (service {}) will be replaced",
                rule.service
            );
            continue;
        }
        let key = rule_key(rule);
        if existing_by_key.contains_key(&key) {
            warn!("Duplicate ingress rules for {}; keeping the first", key);
            continue;
        }
        existing_by_key.insert(key, rule);
    }

    let mut rules = Vec::with_capacity(desired.len() + 1);
    let mut desired_keys = HashSet::with_capacity(desired.len());
    for route in desired {
        let live_origin = existing_by_key
            .get(&route.key)
            .and_then(|rule| rule.origin_request.as_ref());
        if origin_request::is_invalid(live_origin) {
            warn!(
                "Existing originRequest of {} is not an object; rebuilding managed keys",
                route.key
            );
        }

        let mut rule = IngressRule::new(route.hostname(), route.path(), route.service.clone());
        rule.origin_request = origin_request::merge_managed(
            live_origin,
            route.origin_server_name.as_deref(),
            route.no_tls_verify,
        );
        rules.push(rule);
        desired_keys.insert(&route.key);
    }
    rules.sort_by(|a, b| (&a.hostname, &a.path).cmp(&(&b.hostname, &b.path)));

    // BTreeMap iteration is already in key order.
    let removed = existing_by_key
        .iter()
        .filter(|(key, _)| !desired_keys.contains(key))
        .map(|(_, rule)| (*rule).clone())
        .collect();

    let mut fallback = IngressRule::catch_all(FALLBACK_SERVICE);
    fallback.origin_request = catch_all.and_then(|rule| rule.origin_request.clone());
    rules.push(fallback);

    IngressPlan { rules, removed }
}

/// Converges the tunnel's ingress rules
pub struct IngressReconciler {
    api: Box<dyn TunnelConfigApi + Send + Sync>,
    gate: Gate,
}

impl IngressReconciler {
    pub fn new(api: impl TunnelConfigApi + 'static, gate: Gate) -> Self {
        Self {
            api: Box::new(api),
            gate,
        }
    }

    /// Run one ingress pass.
    pub async fn reconcile(&self, desired: &[RouteSpec]) -> Result<IngressSummary, ControllerError> {
        let mut config = self.api.get_tunnel_config().await?;
        let plan = plan_ingress(desired, &config.ingress);

        let mut summary = IngressSummary {
            desired: plan.rules.len(),
            existing: config.ingress.len(),
            removed: plan.removed.len(),
            written: false,
        };

        for rule in &plan.removed {
            warn!(
                "Ingress rule {} -> {} is not defined by labels; it will be removed",
                rule_key(rule),
                rule.service
            );
        }

        if plan.rules == config.ingress {
            debug!("Tunnel ingress up to date ({} rules)", plan.rules.len());
            return Ok(summary);
        }

        let live: HashSet<RouteKey> = config.ingress.iter().map(rule_key).collect();
        for rule in plan.rules.iter().filter(|r| !r.hostname.is_empty()) {
            let key = rule_key(rule);
            if !live.contains(&key) {
                info!("Ingress rule {} -> {} will be added", key, rule.service);
            }
        }

        if !self.gate.manage {
            warn!(
                "Tunnel ingress differs ({} desired, {} existing rules) but tunnel management is disabled; skipping update",
                summary.desired, summary.existing
            );
            return Ok(summary);
        }
        if self.gate.dry_run {
            info!(
                "[dry-run] Would update tunnel ingress ({} desired, {} existing rules)",
                summary.desired, summary.existing
            );
            return Ok(summary);
        }

        info!(
            "Updating tunnel ingress ({} desired, {} existing rules)",
            summary.desired, summary.existing
        );
        config.ingress = plan.rules;
        self.api.update_tunnel_config(&config).await?;
        summary.written = true;
        Ok(summary)
    }
}
