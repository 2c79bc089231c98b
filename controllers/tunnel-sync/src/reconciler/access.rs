//! Access reconciler
//!
//! Converges Access applications, the policies attached to them and their tags.
//!
//! Per desired app:
//! 1. Resolve each policy to a live ID, creating or updating managed policies.
//! 2. Ensure explicit tags exist; on any failure keep the live tags instead.
//! 3. Resolve the live app by explicit ID or by (name, domain).
//! 4. Create, update or leave it alone.
//!
//! Afterwards, live apps that carry the ownership tag and were not touched
//! are deleted. Policies are never deleted.

use super::Gate;
use crate::error::ControllerError;
use crate::reconcile_helpers::{dedupe_tags, has_tag, multisets_equal, string_sets_equal};
use cloudflare_client::{
    AccessApi, AccessApp, AccessAppInput, AccessPolicy, AccessPolicyInput, AccessRule, DEFAULT_ACCESS_APP_TYPE,
    PolicyRef,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};
use tunnel_model::{AccessAppSpec, AccessPolicySpec, OwnershipMarker};

/// Outcome of one Access pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    /// Apps given up on: unresolvable policies, missing or ambiguous live app
    pub aborted: usize,
    /// Changes not applied because of the management switch or dry-run
    pub skipped: usize,
    pub failed: usize,
    pub policies_created: usize,
    pub policies_updated: usize,
}

enum AppOutcome {
    Created,
    Updated,
    Unchanged,
    Aborted,
    Skipped,
    Failed,
}

fn lower(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Live apps indexed by ID and by lower-cased (name, domain).
#[derive(Default)]
struct AppIndex {
    by_id: HashMap<String, AccessApp>,
    by_key: HashMap<(String, String), Vec<String>>,
}

impl AppIndex {
    fn new(apps: &[AccessApp]) -> Self {
        let mut index = Self::default();
        for app in apps {
            index.insert(app.clone());
        }
        index
    }

    fn insert(&mut self, app: AccessApp) {
        if let Some(previous) = self.by_id.get(&app.id) {
            let old_key = (lower(&previous.name), lower(&previous.domain));
            if let Some(ids) = self.by_key.get_mut(&old_key) {
                ids.retain(|id| id != &app.id);
            }
        }
        self.by_key
            .entry((lower(&app.name), lower(&app.domain)))
            .or_default()
            .push(app.id.clone());
        self.by_id.insert(app.id.clone(), app);
    }

    fn get(&self, id: &str) -> Option<&AccessApp> {
        self.by_id.get(id)
    }

    fn find(&self, name: &str, domain: &str) -> Vec<&AccessApp> {
        self.by_key
            .get(&(lower(name), lower(domain)))
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).collect())
            .unwrap_or_default()
    }
}

/// Live policies indexed by ID and by lower-cased name.
#[derive(Default)]
struct PolicyIndex {
    by_id: HashMap<String, AccessPolicy>,
    by_name: HashMap<String, Vec<String>>,
}

impl PolicyIndex {
    fn new(policies: &[AccessPolicy]) -> Self {
        let mut index = Self::default();
        for policy in policies.iter().filter(|p| !p.id.is_empty()) {
            index.insert(policy.clone());
        }
        index
    }

    fn insert(&mut self, policy: AccessPolicy) {
        if let Some(previous) = self.by_id.get(&policy.id) {
            if let Some(ids) = self.by_name.get_mut(&lower(&previous.name)) {
                ids.retain(|id| id != &policy.id);
            }
        }
        if !policy.name.is_empty() {
            self.by_name
                .entry(lower(&policy.name))
                .or_default()
                .push(policy.id.clone());
        }
        self.by_id.insert(policy.id.clone(), policy);
    }

    fn get(&self, id: &str) -> Option<&AccessPolicy> {
        self.by_id.get(id)
    }

    fn find(&self, name: &str) -> Vec<&AccessPolicy> {
        self.by_name
            .get(&lower(name))
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).collect())
            .unwrap_or_default()
    }
}

/// Mutable state of one pass
struct PassState {
    apps: AppIndex,
    policies: PolicyIndex,
    /// The ownership tag exists (or would, in dry-run) and may be attached
    tagging: bool,
    /// IDs of live apps resolved or created this pass
    touched: HashSet<String>,
    summary: AccessSummary,
}

fn policy_rules(spec: &AccessPolicySpec) -> Vec<AccessRule> {
    spec.include_emails
        .iter()
        .map(|email| AccessRule::Email(email.clone()))
        .chain(spec.include_ips.iter().map(|ip| AccessRule::Ip(ip.clone())))
        .collect()
}

fn policy_input(spec: &AccessPolicySpec, live: Option<&AccessPolicy>) -> AccessPolicyInput {
    let name = spec
        .name
        .clone()
        .or_else(|| live.map(|p| p.name.clone()))
        .unwrap_or_default();
    let action = spec
        .action
        .map(|a| a.as_str().to_string())
        .or_else(|| live.map(|p| p.action.clone()))
        .unwrap_or_default();
    AccessPolicyInput {
        name,
        action,
        include: policy_rules(spec),
    }
}

/// Whether a managed policy's action or include rules differ from the live record.
pub fn policy_needs_update(spec: &AccessPolicySpec, live: &AccessPolicy) -> bool {
    if let Some(action) = spec.action {
        if !live.action.trim().eq_ignore_ascii_case(action.as_str()) {
            return true;
        }
    }
    let desired = policy_rules(spec).iter().map(AccessRule::normalized).collect();
    let current = live.include.iter().map(AccessRule::normalized).collect();
    !multisets_equal(desired, current)
}

/// Policy IDs ordered by precedence.
fn ordered_policy_ids(refs: &[PolicyRef]) -> Vec<&str> {
    let mut ordered: Vec<&PolicyRef> = refs.iter().filter(|r| !r.id.is_empty()).collect();
    ordered.sort_by_key(|r| r.precedence);
    ordered.into_iter().map(|r| r.id.as_str()).collect()
}

/// Whether the live app differs from what would be written.
pub fn app_needs_update(live: &AccessApp, desired: &AccessAppInput) -> bool {
    live.name != desired.name
        || live.domain != desired.domain
        || (!live.app_type.is_empty() && live.app_type != desired.app_type)
        || ordered_policy_ids(&live.policies) != ordered_policy_ids(&desired.policies)
        || !string_sets_equal(&live.tags, &desired.tags)
}

/// Converges Access applications and their policies
pub struct AccessReconciler {
    api: Box<dyn AccessApi + Send + Sync>,
    marker: OwnershipMarker,
    gate: Gate,
}

impl AccessReconciler {
    pub fn new(api: impl AccessApi + 'static, marker: OwnershipMarker, gate: Gate) -> Self {
        Self {
            api: Box::new(api),
            marker,
            gate,
        }
    }

    /// Run one Access pass.
    ///
    /// Fails only when apps or policies cannot be listed. Per-app problems are
    /// logged and counted in the summary.
    pub async fn reconcile(&self, apps: &[AccessAppSpec]) -> Result<AccessSummary, ControllerError> {
        if apps.is_empty() && !self.gate.manage {
            debug!("No Access apps desired and Access management disabled; skipping Access sync");
            return Ok(AccessSummary::default());
        }

        let live_apps = self.api.list_access_apps().await?;
        let live_policies = if apps.is_empty() {
            Vec::new()
        } else {
            self.api.list_access_policies().await?
        };

        let mut state = PassState {
            apps: AppIndex::new(&live_apps),
            policies: PolicyIndex::new(&live_policies),
            tagging: false,
            touched: HashSet::new(),
            summary: AccessSummary::default(),
        };

        if !apps.is_empty() {
            state.tagging = self.ensure_marker_tag().await;
        }

        for app in apps {
            let outcome = self.reconcile_app(app, &mut state).await;
            let summary = &mut state.summary;
            match outcome {
                AppOutcome::Created => summary.created += 1,
                AppOutcome::Updated => summary.updated += 1,
                AppOutcome::Unchanged => summary.unchanged += 1,
                AppOutcome::Aborted => summary.aborted += 1,
                AppOutcome::Skipped => summary.skipped += 1,
                AppOutcome::Failed => summary.failed += 1,
            }
        }

        self.delete_orphans(&live_apps, &mut state).await;
        Ok(state.summary)
    }

    async fn ensure_marker_tag(&self) -> bool {
        if !self.gate.manage {
            return false;
        }
        if self.gate.dry_run {
            return true;
        }
        match self.api.ensure_access_tag(self.marker.as_str()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Failed to ensure Access tag {}; apps will not be tagged this pass: {}",
                    self.marker, e
                );
                false
            }
        }
    }

    async fn reconcile_app(&self, app: &AccessAppSpec, state: &mut PassState) -> AppOutcome {
        let Some(policy_refs) = self.resolve_policies(app, state).await else {
            return AppOutcome::Aborted;
        };
        if policy_refs.is_empty() {
            warn!("Access app {} has no resolvable policies this pass; skipping", app.key());
            return AppOutcome::Skipped;
        }

        let explicit_tags = self.resolve_tags(app).await;

        let live = if let Some(id) = &app.id {
            match state.apps.get(id) {
                Some(live) => Some(live.clone()),
                None => {
                    warn!("Access app {} with ID {} not found; skipping", app.key(), id);
                    return AppOutcome::Aborted;
                }
            }
        } else {
            match state.apps.find(&app.name, &app.domain).as_slice() {
                [] => None,
                [live] => Some((*live).clone()),
                matches => {
                    warn!(
                        "Found {} Access apps named {} for domain {}; skipping ambiguous app",
                        matches.len(),
                        app.name,
                        app.domain
                    );
                    return AppOutcome::Aborted;
                }
            }
        };

        let base_tags = match (explicit_tags, &live) {
            (Some(tags), _) => tags,
            (None, Some(live)) => live.tags.clone(),
            (None, None) => Vec::new(),
        };
        let mut tags = dedupe_tags(&base_tags);
        if state.tagging && !has_tag(&tags, self.marker.as_str()) {
            tags.push(self.marker.as_str().to_string());
        }

        let input = AccessAppInput {
            name: app.name.clone(),
            domain: app.domain.clone(),
            app_type: DEFAULT_ACCESS_APP_TYPE.to_string(),
            policies: policy_refs,
            tags,
        };

        match live {
            None => self.create_app(app, &input, state).await,
            Some(live) => self.update_app(app, &live, &input, state).await,
        }
    }

    async fn create_app(&self, app: &AccessAppSpec, input: &AccessAppInput, state: &mut PassState) -> AppOutcome {
        if !self.gate.manage {
            warn!(
                "Access app {} does not exist but Access management is disabled; skipping create",
                app.key()
            );
            return AppOutcome::Skipped;
        }
        if self.gate.dry_run {
            info!("[dry-run] Would create Access app {}", app.key());
            return AppOutcome::Skipped;
        }

        info!("Creating Access app {} (source {})", app.key(), app.source);
        match self.api.create_access_app(input).await {
            Ok(created) => {
                state.touched.insert(created.id.clone());
                state.apps.insert(created);
                AppOutcome::Created
            }
            Err(e) => {
                error!("Failed to create Access app {}: {}", app.key(), e);
                AppOutcome::Failed
            }
        }
    }

    async fn update_app(
        &self,
        app: &AccessAppSpec,
        live: &AccessApp,
        input: &AccessAppInput,
        state: &mut PassState,
    ) -> AppOutcome {
        state.touched.insert(live.id.clone());

        if !app_needs_update(live, input) {
            debug!("Access app {} up to date", app.key());
            return AppOutcome::Unchanged;
        }
        if !self.gate.manage {
            warn!(
                "Access app {} differs but Access management is disabled; skipping update",
                app.key()
            );
            return AppOutcome::Skipped;
        }
        if self.gate.dry_run {
            info!("[dry-run] Would update Access app {} ({})", app.key(), live.id);
            return AppOutcome::Skipped;
        }

        info!("Updating Access app {} ({})", app.key(), live.id);
        match self.api.update_access_app(&live.id, input).await {
            Ok(updated) => {
                state.apps.insert(updated);
                AppOutcome::Updated
            }
            Err(e) => {
                error!("Failed to update Access app {} ({}): {}", app.key(), live.id, e);
                AppOutcome::Failed
            }
        }
    }

    /// Explicit tags to write, or `None` to keep the live ones.
    async fn resolve_tags(&self, app: &AccessAppSpec) -> Option<Vec<String>> {
        let tags = dedupe_tags(app.tags.as_ref()?);
        if tags.is_empty() || !self.gate.allows_writes() {
            return Some(tags);
        }

        let mut ok = true;
        for tag in &tags {
            if let Err(e) = self.api.ensure_access_tag(tag).await {
                warn!("Failed to ensure Access tag {} for app {}: {}", tag, app.key(), e);
                ok = false;
            }
        }
        if !ok {
            warn!("Keeping existing tags of Access app {} this pass", app.key());
            return None;
        }
        Some(tags)
    }

    /// Policy references in precedence order, or `None` when the app must be skipped.
    async fn resolve_policies(&self, app: &AccessAppSpec, state: &mut PassState) -> Option<Vec<PolicyRef>> {
        let mut refs: Vec<PolicyRef> = Vec::with_capacity(app.policies.len());

        for policy in &app.policies {
            let precedence = u32::try_from(refs.len() + 1).unwrap_or(u32::MAX);

            if let Some(id) = &policy.id {
                match state.policies.get(id).cloned() {
                    Some(live) => {
                        refs.push(PolicyRef::new(live.id.clone(), precedence));
                        if policy.is_managed() {
                            self.update_policy_if_needed(app, policy, &live, state).await;
                        }
                    }
                    None if !policy.is_managed() => {
                        warn!(
                            "Access policy {} for app {} not found at account scope; attaching by ID",
                            id,
                            app.key()
                        );
                        refs.push(PolicyRef::new(id.clone(), precedence));
                    }
                    None => {
                        warn!("Access policy {} for app {} not found; skipping app", policy.label(), app.key());
                        return None;
                    }
                }
                continue;
            }

            let name = policy.name.as_deref().unwrap_or_default();
            let matches: Vec<AccessPolicy> = state.policies.find(name).into_iter().cloned().collect();
            match matches.as_slice() {
                [] if !policy.is_managed() => {
                    warn!("Access policy {} for app {} not found; skipping app", name, app.key());
                    return None;
                }
                [] => {
                    if let Some(created) = self.create_policy(app, policy, state).await? {
                        refs.push(PolicyRef::new(created, precedence));
                    }
                }
                [live] => {
                    refs.push(PolicyRef::new(live.id.clone(), precedence));
                    if policy.is_managed() {
                        self.update_policy_if_needed(app, policy, live, state).await;
                    }
                }
                _ => {
                    warn!(
                        "Found {} Access policies named {}; skipping app {}",
                        matches.len(),
                        name,
                        app.key()
                    );
                    return None;
                }
            }
        }

        Some(refs)
    }

    /// `Some(None)` when the create was gated off, `None` when it failed.
    async fn create_policy(
        &self,
        app: &AccessAppSpec,
        policy: &AccessPolicySpec,
        state: &mut PassState,
    ) -> Option<Option<String>> {
        if !self.gate.manage {
            warn!(
                "Access policy {} for app {} does not exist but Access management is disabled; skipping create",
                policy.label(),
                app.key()
            );
            return Some(None);
        }
        if self.gate.dry_run {
            info!("[dry-run] Would create Access policy {} for app {}", policy.label(), app.key());
            return Some(None);
        }

        info!("Creating Access policy {} for app {}", policy.label(), app.key());
        match self.api.create_access_policy(&policy_input(policy, None)).await {
            Ok(created) => {
                let id = created.id.clone();
                state.policies.insert(created);
                state.summary.policies_created += 1;
                Some(Some(id))
            }
            Err(e) => {
                error!("Failed to create Access policy {}: {}", policy.label(), e);
                None
            }
        }
    }

    async fn update_policy_if_needed(
        &self,
        app: &AccessAppSpec,
        policy: &AccessPolicySpec,
        live: &AccessPolicy,
        state: &mut PassState,
    ) {
        if live.has_unsupported_rules {
            warn!(
                "Access policy {} has include rules of unsupported types; they will be replaced",
                policy.label()
            );
        }
        if !policy_needs_update(policy, live) {
            debug!("Access policy {} up to date", policy.label());
            return;
        }
        if !self.gate.manage {
            warn!(
                "Access policy {} differs but Access management is disabled; skipping update",
                policy.label()
            );
            return;
        }
        if self.gate.dry_run {
            info!("[dry-run] Would update Access policy {} for app {}", policy.label(), app.key());
            return;
        }

        info!("Updating Access policy {} ({}) for app {}", policy.label(), live.id, app.key());
        match self.api.update_access_policy(&live.id, &policy_input(policy, Some(live))).await {
            Ok(updated) => {
                state.policies.insert(updated);
                state.summary.policies_updated += 1;
            }
            Err(e) => error!("Failed to update Access policy {} ({}): {}", policy.label(), live.id, e),
        }
    }

    async fn delete_orphans(&self, live_apps: &[AccessApp], state: &mut PassState) {
        if !self.gate.manage {
            return;
        }

        for app in live_apps {
            if state.touched.contains(&app.id) || !has_tag(&app.tags, self.marker.as_str()) {
                continue;
            }
            warn!(
                "Access app {}@{} ({}) is no longer desired; deleting",
                app.name, app.domain, app.id
            );
            if self.gate.dry_run {
                info!("[dry-run] Would delete Access app {} ({})", app.name, app.id);
                continue;
            }
            match self.api.delete_access_app(&app.id).await {
                Ok(()) => state.summary.deleted += 1,
                Err(e) => {
                    error!("Failed to delete Access app {} ({}): {}", app.name, app.id, e);
                    state.summary.failed += 1;
                }
            }
        }
    }
}
