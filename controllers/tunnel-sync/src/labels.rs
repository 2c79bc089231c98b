//! Container labels to desired state.
//!
//! Route labels (`cloudflare.tunnel.*`) become [`RouteSpec`]s and Access labels
//! (`cloudflare.access.*`) become [`AccessAppSpec`]s. Invalid entries are
//! reported as [`LabelError`]s and left out of the desired set; they never fail
//! the pass.

use crate::config::parse_bool;
use docker_client::ContainerInfo;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use thiserror::Error;
use tunnel_model::{AccessAppSpec, AccessPolicySpec, PolicyAction, RouteKey, RouteSpec, SourceRef};

pub const LABEL_PREFIX: &str = "cloudflare.tunnel.";
pub const LABEL_ENABLE: &str = "cloudflare.tunnel.enable";
pub const LABEL_HOSTNAME: &str = "cloudflare.tunnel.hostname";
pub const LABEL_PATH: &str = "cloudflare.tunnel.path";
pub const LABEL_SERVICE: &str = "cloudflare.tunnel.service";
pub const LABEL_ORIGIN_SERVER_NAME: &str = "cloudflare.tunnel.origin.server-name";
pub const LABEL_ORIGIN_NO_TLS_VERIFY: &str = "cloudflare.tunnel.origin.no-tls-verify";

pub const ACCESS_LABEL_PREFIX: &str = "cloudflare.access.";
pub const ACCESS_LABEL_ENABLE: &str = "cloudflare.access.enable";
pub const ACCESS_LABEL_APP_NAME: &str = "cloudflare.access.app.name";
pub const ACCESS_LABEL_APP_DOMAIN: &str = "cloudflare.access.app.domain";
pub const ACCESS_LABEL_APP_ID: &str = "cloudflare.access.app.id";
pub const ACCESS_LABEL_APP_TAGS: &str = "cloudflare.access.app.tags";
pub const ACCESS_LABEL_POLICY_PREFIX: &str = "cloudflare.access.policy.";

/// A label validation problem. The offending route, policy or app is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("container {container}: invalid {label} label: {value:?} is not a boolean")]
    InvalidBool {
        container: String,
        label: String,
        value: String,
    },

    #[error("container {container}: missing required {label} label")]
    Missing { container: String, label: String },

    #[error("container {container}: {label} cannot be empty")]
    Empty { container: String, label: String },

    #[error("container {container}: {label} must start with '/'")]
    InvalidPath { container: String, label: String },

    #[error("container {container}: {label} is set without matching {counterpart}; skipping")]
    Unpaired {
        container: String,
        label: String,
        counterpart: String,
    },

    #[error("duplicate route definition for {0}")]
    DuplicateRoute(RouteKey),

    #[error("container {container}: missing {ACCESS_LABEL_APP_DOMAIN}; set {ACCESS_LABEL_APP_DOMAIN} or {LABEL_HOSTNAME}")]
    MissingDomain { container: String },

    #[error("container {container}: invalid access policy label {label}")]
    InvalidPolicyLabel { container: String, label: String },

    #[error("container {container}: unknown access policy label {label}")]
    UnknownPolicyLabel { container: String, label: String },

    #[error("container {container}: access policy {index} {reason}")]
    InvalidPolicy {
        container: String,
        index: u32,
        reason: String,
    },

    #[error("container {container}: no access policies configured")]
    NoPolicies { container: String },

    #[error("duplicate access app definition for {0}")]
    DuplicateApp(String),
}

fn display_name(container: &ContainerInfo) -> String {
    if container.name.is_empty() {
        container.id.clone()
    } else {
        container.name.clone()
    }
}

fn sorted_by_id(containers: &[ContainerInfo]) -> Vec<&ContainerInfo> {
    let mut sorted: Vec<&ContainerInfo> = containers.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    sorted
}

/// Reads `label` as an opt-in switch. `Ok(false)` when absent or false.
fn enabled(container: &ContainerInfo, label: &str) -> Result<bool, LabelError> {
    match container.labels.get(label) {
        None => Ok(false),
        Some(value) => parse_bool(value).ok_or_else(|| LabelError::InvalidBool {
            container: display_name(container),
            label: label.to_string(),
            value: value.clone(),
        }),
    }
}

fn trimmed<'a>(labels: &'a HashMap<String, String>, key: &str) -> &'a str {
    labels.get(key).map(|v| v.trim()).unwrap_or("")
}

/// Label names of one route: the unsuffixed base route or a `.<suffix>` variant.
struct RouteLabels {
    hostname: String,
    service: String,
    path: String,
    origin_server_name: String,
    origin_no_tls_verify: String,
}

impl RouteLabels {
    fn base() -> Self {
        Self::with_suffix("")
    }

    fn with_suffix(suffix: &str) -> Self {
        let name = |base: &str| {
            if suffix.is_empty() {
                base.to_string()
            } else {
                format!("{}.{}", base, suffix)
            }
        };
        Self {
            hostname: name(LABEL_HOSTNAME),
            service: name(LABEL_SERVICE),
            path: name(LABEL_PATH),
            origin_server_name: name(LABEL_ORIGIN_SERVER_NAME),
            origin_no_tls_verify: name(LABEL_ORIGIN_NO_TLS_VERIFY),
        }
    }
}

fn parse_route(container: &ContainerInfo, names: &RouteLabels, suffixed: bool) -> Result<RouteSpec, LabelError> {
    let labels = &container.labels;
    let hostname = trimmed(labels, &names.hostname);
    let service = trimmed(labels, &names.service);
    let path = trimmed(labels, &names.path);

    let blank = |label: &str| {
        if suffixed {
            LabelError::Empty {
                container: display_name(container),
                label: label.to_string(),
            }
        } else {
            LabelError::Missing {
                container: display_name(container),
                label: label.to_string(),
            }
        }
    };
    if hostname.is_empty() {
        return Err(blank(&names.hostname));
    }
    if service.is_empty() {
        return Err(blank(&names.service));
    }
    if !path.is_empty() && !path.starts_with('/') {
        return Err(LabelError::InvalidPath {
            container: display_name(container),
            label: names.path.clone(),
        });
    }

    let origin_server_name = match labels.get(&names.origin_server_name) {
        None => None,
        Some(value) if value.trim().is_empty() => {
            return Err(LabelError::Empty {
                container: display_name(container),
                label: names.origin_server_name.clone(),
            });
        }
        Some(value) => Some(value.trim().to_string()),
    };

    let no_tls_verify = match labels.get(&names.origin_no_tls_verify) {
        None => None,
        Some(value) => Some(parse_bool(value).ok_or_else(|| LabelError::InvalidBool {
            container: display_name(container),
            label: names.origin_no_tls_verify.clone(),
            value: value.clone(),
        })?),
    };

    Ok(RouteSpec {
        key: RouteKey::new(hostname, path),
        service: service.to_string(),
        origin_server_name,
        no_tls_verify,
        source: SourceRef::new(container.id.clone(), container.name.clone()),
    })
}

fn collect_suffixes(labels: &HashMap<String, String>, base: &str) -> BTreeSet<String> {
    let prefix = format!("{}.", base);
    labels
        .keys()
        .filter_map(|key| key.strip_prefix(&prefix))
        .filter(|suffix| !suffix.is_empty())
        .map(str::to_string)
        .collect()
}

/// Desired routes from every enabled container, in container ID order.
///
/// The first definition of a (hostname, path) wins; later ones are reported.
pub fn parse_routes(containers: &[ContainerInfo]) -> (Vec<RouteSpec>, Vec<LabelError>) {
    let mut routes = Vec::new();
    let mut errors = Vec::new();
    let mut seen: HashSet<RouteKey> = HashSet::new();

    let mut push = |route: RouteSpec, routes: &mut Vec<RouteSpec>, errors: &mut Vec<LabelError>| {
        if seen.insert(route.key.clone()) {
            routes.push(route);
        } else {
            errors.push(LabelError::DuplicateRoute(route.key));
        }
    };

    for container in sorted_by_id(containers) {
        match enabled(container, LABEL_ENABLE) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                errors.push(e);
                continue;
            }
        }

        match parse_route(container, &RouteLabels::base(), false) {
            Ok(route) => push(route, &mut routes, &mut errors),
            Err(e) => {
                errors.push(e);
                continue;
            }
        }

        let host_suffixes = collect_suffixes(&container.labels, LABEL_HOSTNAME);
        let service_suffixes = collect_suffixes(&container.labels, LABEL_SERVICE);

        for suffix in host_suffixes.difference(&service_suffixes) {
            errors.push(LabelError::Unpaired {
                container: display_name(container),
                label: format!("{}.{}", LABEL_HOSTNAME, suffix),
                counterpart: format!("{}.{}", LABEL_SERVICE, suffix),
            });
        }
        for suffix in service_suffixes.difference(&host_suffixes) {
            errors.push(LabelError::Unpaired {
                container: display_name(container),
                label: format!("{}.{}", LABEL_SERVICE, suffix),
                counterpart: format!("{}.{}", LABEL_HOSTNAME, suffix),
            });
        }

        for suffix in host_suffixes.intersection(&service_suffixes) {
            match parse_route(container, &RouteLabels::with_suffix(suffix), true) {
                Ok(route) => push(route, &mut routes, &mut errors),
                Err(e) => errors.push(e),
            }
        }
    }

    (routes, errors)
}

fn split_comma_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Default)]
struct PolicyBuilder {
    id: String,
    name: String,
    action: String,
    include_emails: Vec<String>,
    include_ips: Vec<String>,
}

fn parse_policies(container: &ContainerInfo) -> (Vec<AccessPolicySpec>, Vec<LabelError>) {
    let mut builders: BTreeMap<u32, PolicyBuilder> = BTreeMap::new();
    let mut errors = Vec::new();

    let mut keys: Vec<&String> = container
        .labels
        .keys()
        .filter(|k| k.starts_with(ACCESS_LABEL_POLICY_PREFIX))
        .collect();
    keys.sort();

    for key in keys {
        let remainder = &key[ACCESS_LABEL_POLICY_PREFIX.len()..];
        let Some((index, field)) = remainder.split_once('.') else {
            errors.push(LabelError::InvalidPolicyLabel {
                container: display_name(container),
                label: key.clone(),
            });
            continue;
        };
        let Some(index) = index.parse::<u32>().ok().filter(|i| *i >= 1) else {
            errors.push(LabelError::InvalidPolicyLabel {
                container: display_name(container),
                label: key.clone(),
            });
            continue;
        };

        let value = container.labels[key].trim();
        let builder = builders.entry(index).or_default();
        match field {
            "id" => builder.id = value.to_string(),
            "name" => builder.name = value.to_string(),
            "action" => builder.action = value.to_ascii_lowercase(),
            "include.emails" => builder.include_emails = split_comma_list(value),
            "include.ips" => builder.include_ips = split_comma_list(value),
            _ => errors.push(LabelError::UnknownPolicyLabel {
                container: display_name(container),
                label: key.clone(),
            }),
        }
    }

    let mut policies = Vec::new();
    for (index, builder) in builders {
        let invalid = |reason: &str| LabelError::InvalidPolicy {
            container: display_name(container),
            index,
            reason: reason.to_string(),
        };
        let non_empty = |s: String| (!s.is_empty()).then_some(s);

        let reference_only =
            builder.action.is_empty() && builder.include_emails.is_empty() && builder.include_ips.is_empty();
        if reference_only {
            if builder.id.is_empty() && builder.name.is_empty() {
                errors.push(invalid("missing id or name"));
                continue;
            }
            policies.push(AccessPolicySpec {
                id: non_empty(builder.id),
                name: non_empty(builder.name),
                ..Default::default()
            });
            continue;
        }

        if builder.name.is_empty() {
            errors.push(invalid("missing name"));
            continue;
        }
        if builder.action.is_empty() {
            errors.push(invalid("missing action"));
            continue;
        }
        let action = match builder.action.parse::<PolicyAction>() {
            Ok(action) => action,
            Err(_) => {
                errors.push(invalid(&format!("has invalid action {:?}", builder.action)));
                continue;
            }
        };
        if builder.include_emails.is_empty() && builder.include_ips.is_empty() {
            errors.push(invalid("has no include rules"));
            continue;
        }

        policies.push(AccessPolicySpec {
            id: non_empty(builder.id),
            name: Some(builder.name),
            action: Some(action),
            include_emails: builder.include_emails,
            include_ips: builder.include_ips,
        });
    }

    (policies, errors)
}

/// Desired Access apps from every enabled container, sorted by `name@domain`.
pub fn parse_access_apps(containers: &[ContainerInfo]) -> (Vec<AccessAppSpec>, Vec<LabelError>) {
    let mut apps: BTreeMap<String, AccessAppSpec> = BTreeMap::new();
    let mut errors = Vec::new();

    for container in sorted_by_id(containers) {
        match enabled(container, ACCESS_LABEL_ENABLE) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                errors.push(e);
                continue;
            }
        }

        let labels = &container.labels;
        let name = trimmed(labels, ACCESS_LABEL_APP_NAME);
        if name.is_empty() {
            errors.push(LabelError::Missing {
                container: display_name(container),
                label: ACCESS_LABEL_APP_NAME.to_string(),
            });
            continue;
        }

        let domain = match trimmed(labels, ACCESS_LABEL_APP_DOMAIN) {
            "" => trimmed(labels, LABEL_HOSTNAME),
            domain => domain,
        };
        if domain.is_empty() {
            errors.push(LabelError::MissingDomain {
                container: display_name(container),
            });
            continue;
        }

        let (policies, policy_errors) = parse_policies(container);
        errors.extend(policy_errors);
        if policies.is_empty() {
            errors.push(LabelError::NoPolicies {
                container: display_name(container),
            });
            continue;
        }

        let app = AccessAppSpec {
            id: Some(trimmed(labels, ACCESS_LABEL_APP_ID))
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            name: name.to_string(),
            domain: domain.to_string(),
            policies,
            tags: labels.get(ACCESS_LABEL_APP_TAGS).map(|v| split_comma_list(v)),
            source: SourceRef::new(container.id.clone(), container.name.clone()),
        };

        let key = app.key();
        if apps.contains_key(&key) {
            errors.push(LabelError::DuplicateApp(key));
            continue;
        }
        apps.insert(key, app);
    }

    (apps.into_values().collect(), errors)
}
