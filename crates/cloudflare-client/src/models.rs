//! Cloudflare API models
//!
//! These models match the JSON bodies of the Cloudflare v4 API.
//! See: https://developers.cloudflare.com/api/

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Access app type used when none is given.
pub const DEFAULT_ACCESS_APP_TYPE: &str = "self_hosted";

/// Suffix of a tunnel's public CNAME target.
pub const TUNNEL_TARGET_SUFFIX: &str = "cfargotunnel.com";

/// CNAME target for a tunnel, e.g. `<uuid>.cfargotunnel.com`.
pub fn tunnel_target(tunnel_id: &str) -> String {
    format!("{}.{}", tunnel_id, TUNNEL_TARGET_SUFFIX)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Tunnel configuration
// ---------------------------------------------------------------------------

/// One ingress rule of a Cloudflare Tunnel configuration.
///
/// `origin_request` is kept as raw JSON; it may carry keys this crate does not model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressRule {
    #[serde(default, skip_serializing_if = "String::is_empty", deserialize_with = "null_as_default")]
    pub hostname: String,
    #[serde(default, skip_serializing_if = "String::is_empty", deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub service: String,
    #[serde(rename = "originRequest", default, skip_serializing_if = "Option::is_none")]
    pub origin_request: Option<Value>,
}

impl IngressRule {
    pub fn new(hostname: impl Into<String>, path: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            path: path.into(),
            service: service.into(),
            origin_request: None,
        }
    }

    /// A rule without hostname, matching everything.
    pub fn catch_all(service: impl Into<String>) -> Self {
        Self::new("", "", service)
    }
}

/// The `config` object of a tunnel configuration.
///
/// Keys other than `ingress` (e.g. `warp-routing`, `originRequest`) are kept in
/// `other` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TunnelConfig {
    #[serde(default, deserialize_with = "null_as_default")]
    pub ingress: Vec<IngressRule>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Result of `GET .../cfd_tunnel/{id}/configurations`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TunnelConfigurationResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub config: TunnelConfig,
    #[serde(default)]
    pub tunnel_id: Option<String>,
    #[serde(default)]
    pub version: Option<u64>,
}

// ---------------------------------------------------------------------------
// DNS
// ---------------------------------------------------------------------------

/// Zone model (only the fields used for hostname matching)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

impl Zone {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// DNS record model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub proxied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// 1 means "automatic"
    #[serde(default)]
    pub ttl: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_on: Option<String>, // ISO 8601 datetime
}

impl DnsRecord {
    pub fn comment_str(&self) -> &str {
        self.comment.as_deref().unwrap_or("")
    }
}

/// Body for creating or replacing a DNS record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsRecordInput {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub proxied: bool,
    pub ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

/// Policy attached to an Access application, in precedence order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyRef {
    pub id: String,
    pub precedence: u32,
}

impl PolicyRef {
    pub fn new(id: impl Into<String>, precedence: u32) -> Self {
        Self {
            id: id.into(),
            precedence,
        }
    }
}

/// Apps return policies either as bare IDs or as `{id, precedence, ...}` objects.
/// Missing precedence falls back to position + 1; entries without ID are dropped.
fn policy_refs<'de, D>(deserializer: D) -> Result<Vec<PolicyRef>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    let mut refs = Vec::with_capacity(raw.len());
    for (index, item) in raw.into_iter().enumerate() {
        let fallback = u32::try_from(index + 1).unwrap_or(u32::MAX);
        match item {
            Value::String(id) if !id.is_empty() => refs.push(PolicyRef::new(id, fallback)),
            Value::Object(obj) => {
                let Some(id) = obj.get("id").and_then(Value::as_str).filter(|id| !id.is_empty()) else {
                    continue;
                };
                let precedence = obj
                    .get("precedence")
                    .and_then(Value::as_u64)
                    .and_then(|p| u32::try_from(p).ok())
                    .filter(|p| *p > 0)
                    .unwrap_or(fallback);
                refs.push(PolicyRef::new(id, precedence));
            }
            _ => {}
        }
    }
    Ok(refs)
}

/// Access application model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessApp {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub domain: String,
    /// Empty when the API omits it.
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub app_type: String,
    #[serde(default, deserialize_with = "policy_refs")]
    pub policies: Vec<PolicyRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>, // ISO 8601 datetime
}

/// Body for creating or replacing an Access application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessAppInput {
    pub name: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub app_type: String,
    pub policies: Vec<PolicyRef>,
    pub tags: Vec<String>,
}

/// An include rule understood by this client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AccessRule {
    Email(String),
    Ip(String),
}

impl AccessRule {
    /// `{"email": {"email": "..."}}` / `{"ip": {"ip": "..."}}`
    pub fn to_json(&self) -> Value {
        match self {
            AccessRule::Email(email) => serde_json::json!({ "email": { "email": email } }),
            AccessRule::Ip(ip) => serde_json::json!({ "ip": { "ip": ip } }),
        }
    }

    /// Lower-cased `kind:value`, used to compare rule sets.
    pub fn normalized(&self) -> String {
        match self {
            AccessRule::Email(email) => format!("email:{}", email.trim().to_lowercase()),
            AccessRule::Ip(ip) => format!("ip:{}", ip.trim().to_lowercase()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccessPolicyPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    decision: String,
    #[serde(default, deserialize_with = "null_as_default")]
    include: Vec<Map<String, Value>>,
}

/// Access policy model
///
/// Only `email` and `ip` include rules are decoded. Anything else sets
/// `has_unsupported_rules`, and rewriting the policy would drop those rules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "AccessPolicyPayload")]
pub struct AccessPolicy {
    pub id: String,
    pub name: String,
    /// The API's `decision` field
    pub action: String,
    pub include: Vec<AccessRule>,
    pub has_unsupported_rules: bool,
}

impl From<AccessPolicyPayload> for AccessPolicy {
    fn from(payload: AccessPolicyPayload) -> Self {
        let mut include = Vec::new();
        let mut has_unsupported_rules = false;
        for entry in payload.include {
            for (kind, value) in entry {
                let inner = |field: &str| {
                    value
                        .get(field)
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                };
                match kind.as_str() {
                    "email" => include.extend(inner("email").map(AccessRule::Email)),
                    "ip" => include.extend(inner("ip").map(AccessRule::Ip)),
                    _ => has_unsupported_rules = true,
                }
            }
        }
        Self {
            id: payload.id,
            name: payload.name,
            action: payload.decision,
            include,
            has_unsupported_rules,
        }
    }
}

/// Body for creating or replacing an Access policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicyInput {
    pub name: String,
    pub action: String,
    pub include: Vec<AccessRule>,
}

impl AccessPolicyInput {
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "decision": self.action,
            "include": self.include.iter().map(AccessRule::to_json).collect::<Vec<_>>(),
        })
    }
}

/// Access tag model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTag {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_policy_refs_accept_strings_and_objects() {
        let app: AccessApp = serde_json::from_value(json!({
            "id": "app-1",
            "name": "app",
            "domain": "app.example.com",
            "policies": ["p-1", {"id": "p-2", "precedence": 7}, {"id": "p-3"}, {"name": "no id"}],
        }))
        .unwrap();

        assert_eq!(
            app.policies,
            vec![PolicyRef::new("p-1", 1), PolicyRef::new("p-2", 7), PolicyRef::new("p-3", 3)]
        );
        assert!(app.tags.is_empty());
        assert_eq!(app.app_type, "");
    }

    #[test]
    fn test_policy_decodes_supported_rules_and_flags_others() {
        let policy: AccessPolicy = serde_json::from_value(json!({
            "id": "p-1",
            "name": "ops",
            "decision": "allow",
            "include": [
                {"email": {"email": "a@example.com"}},
                {"ip": {"ip": "10.0.0.0/8"}},
                {"everyone": {}},
            ],
        }))
        .unwrap();

        assert_eq!(policy.action, "allow");
        assert_eq!(
            policy.include,
            vec![AccessRule::Email("a@example.com".into()), AccessRule::Ip("10.0.0.0/8".into())]
        );
        assert!(policy.has_unsupported_rules);
    }

    #[test]
    fn test_tunnel_config_keeps_unknown_keys() {
        let config: TunnelConfig = serde_json::from_value(json!({
            "ingress": [
                {"hostname": "a.example.com", "service": "http://a:80", "originRequest": {"http2Origin": true}},
                {"service": "http_status:404"},
            ],
            "warp-routing": {"enabled": true},
        }))
        .unwrap();

        assert_eq!(config.ingress.len(), 2);
        assert_eq!(config.ingress[1], IngressRule::catch_all("http_status:404"));
        assert_eq!(config.other.get("warp-routing"), Some(&json!({"enabled": true})));

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back["warp-routing"], json!({"enabled": true}));
        assert!(back["ingress"][1].get("hostname").is_none());
    }

    #[test]
    fn test_policy_input_body_shape() {
        let input = AccessPolicyInput {
            name: "ops".into(),
            action: "allow".into(),
            include: vec![AccessRule::Email("a@example.com".into())],
        };
        assert_eq!(
            input.to_json(),
            json!({"name": "ops", "decision": "allow", "include": [{"email": {"email": "a@example.com"}}]})
        );
    }
}
