//! Ownership marker shared by DNS comments and Access app tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker value used when none is configured.
pub const DEFAULT_MANAGED_BY: &str = "docker-cf-tunnel-sync";

/// The `managed-by=<value>` string stamped on every remote object this system creates.
///
/// A matching marker is the only thing that authorizes deleting a remote
/// object that is no longer desired.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnershipMarker(String);

impl OwnershipMarker {
    /// Build the marker from a configured value. Blank input falls back to [`DEFAULT_MANAGED_BY`].
    pub fn new(managed_by: &str) -> Self {
        let value = managed_by.trim();
        let value = if value.is_empty() { DEFAULT_MANAGED_BY } else { value };
        Self(format!("managed-by={}", value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `candidate` carries this marker (surrounding whitespace ignored).
    pub fn matches(&self, candidate: &str) -> bool {
        candidate.trim() == self.0
    }
}

impl Default for OwnershipMarker {
    fn default() -> Self {
        Self::new(DEFAULT_MANAGED_BY)
    }
}

impl fmt::Display for OwnershipMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OwnershipMarker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
