//! Reconciliation logic for the Cloudflare resources derived from container labels.
//!
//! One reconciler per resource type, each depending only on its own capability trait:
//! - `ingress`: tunnel ingress rules (`TunnelConfigApi`)
//! - `dns`: proxied CNAME records pointing at the tunnel (`DnsApi`)
//! - `access`: Access applications, policies and tags (`AccessApi`)
//!
//! The reconcilers never talk to each other; the controller runs them in sequence.

pub mod access;
#[cfg(test)]
mod access_test;
pub mod dns;
pub mod ingress;
#[cfg(test)]
mod ingress_test;

pub use access::{AccessReconciler, AccessSummary};
pub use dns::{DnsReconciler, DnsSummary};
pub use ingress::{IngressReconciler, IngressSummary};

/// Mutation gate shared by all reconcilers.
///
/// Reads always happen. Writes happen only when `manage` is set and `dry_run` is not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Gate {
    pub manage: bool,
    pub dry_run: bool,
}

impl Gate {
    pub fn new(manage: bool, dry_run: bool) -> Self {
        Self { manage, dry_run }
    }

    pub fn allows_writes(&self) -> bool {
        self.manage && !self.dry_run
    }
}
