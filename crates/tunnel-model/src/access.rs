//! Access application and policy specs.

use crate::route::SourceRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decision of a managed Access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    Allow,
    Deny,
}

impl PolicyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyAction::Allow => "allow",
            PolicyAction::Deny => "deny",
        }
    }
}

impl fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(PolicyAction::Allow),
            "deny" => Ok(PolicyAction::Deny),
            other => Err(format!("unsupported policy action {:?} (expected allow or deny)", other)),
        }
    }
}

/// One policy attached to an Access app.
///
/// A policy with neither an action nor include rules is reference-only: it is
/// attached by ID or name but never created or modified. Anything else is
/// managed and converged to match this spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<PolicyAction>,
    #[serde(default)]
    pub include_emails: Vec<String>,
    #[serde(default)]
    pub include_ips: Vec<String>,
}

impl AccessPolicySpec {
    /// Reference an existing policy by ID.
    pub fn reference_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    /// Reference an existing policy by name.
    pub fn reference_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// A policy this system owns.
    pub fn managed(
        name: impl Into<String>,
        action: PolicyAction,
        include_emails: Vec<String>,
        include_ips: Vec<String>,
    ) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            action: Some(action),
            include_emails,
            include_ips,
        }
    }

    pub fn is_managed(&self) -> bool {
        self.action.is_some() || !self.include_emails.is_empty() || !self.include_ips.is_empty()
    }

    /// Human-readable identity for log lines.
    pub fn label(&self) -> String {
        match (&self.id, &self.name) {
            (Some(id), Some(name)) => format!("{} ({})", name, id),
            (Some(id), None) => id.clone(),
            (None, Some(name)) => name.clone(),
            (None, None) => "<unnamed>".to_string(),
        }
    }
}

/// A desired Access application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessAppSpec {
    /// Explicit remote ID. When set, lookup is by ID only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub domain: String,
    /// Ordered: position + 1 is the precedence.
    #[serde(default)]
    pub policies: Vec<AccessPolicySpec>,
    /// `None` keeps whatever tags the live app has. `Some(vec![])` clears them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub source: SourceRef,
}

impl AccessAppSpec {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            ..Default::default()
        }
    }

    /// `name@domain`, the sort and dedupe key.
    pub fn key(&self) -> String {
        format!("{}@{}", self.name, self.domain)
    }
}
