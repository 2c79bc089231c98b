//! DNS reconciler
//!
//! Keeps one proxied CNAME per route hostname pointing at `<tunnel>.cfargotunnel.com`.
//! Each hostname belongs to the most specific zone of the account. Records are
//! only updated when they carry the ownership comment or already point at the
//! tunnel, and only deleted when they carry the ownership comment.

use super::Gate;
use crate::error::ControllerError;
use crate::reconcile_helpers::{hostname_in_zone, normalize_hostname, sort_zones_by_specificity};
use cloudflare_client::{DnsApi, DnsRecord, DnsRecordInput, Zone, tunnel_target};
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};
use tunnel_model::{OwnershipMarker, RouteSpec};

pub const RECORD_TYPE: &str = "CNAME";
/// Cloudflare's "automatic" TTL
pub const AUTOMATIC_TTL: u32 = 1;

/// Outcome of one DNS pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Ambiguous, unowned or gated records, and dry-run changes
    pub skipped: usize,
    pub failed: usize,
}

/// Hostnames a zone is responsible for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneClaim {
    pub zone: Zone,
    pub hostnames: BTreeSet<String>,
}

/// Distinct normalized hostnames of `routes`.
pub fn desired_hostnames(routes: &[RouteSpec]) -> BTreeSet<String> {
    routes
        .iter()
        .map(|route| normalize_hostname(route.hostname()))
        .filter(|hostname| !hostname.is_empty())
        .collect()
}

/// Assign every hostname to the most specific zone that contains it.
///
/// Returns one claim per zone, most specific zone first, plus the hostnames
/// no zone contains.
pub fn claim_hostnames(hostnames: &BTreeSet<String>, zones: &[Zone]) -> (Vec<ZoneClaim>, BTreeSet<String>) {
    let mut ordered = zones.to_vec();
    sort_zones_by_specificity(&mut ordered, |zone| zone.name.as_str());

    let mut unclaimed = hostnames.clone();
    let claims = ordered
        .into_iter()
        .map(|zone| {
            let zone_name = normalize_hostname(&zone.name);
            let claimed: BTreeSet<String> = unclaimed
                .iter()
                .filter(|hostname| hostname_in_zone(hostname, &zone_name))
                .cloned()
                .collect();
            unclaimed.retain(|hostname| !claimed.contains(hostname));
            ZoneClaim {
                zone,
                hostnames: claimed,
            }
        })
        .collect();

    (claims, unclaimed)
}

/// Converges CNAME records for route hostnames
pub struct DnsReconciler {
    api: Box<dyn DnsApi + Send + Sync>,
    target: String,
    marker: OwnershipMarker,
    gate: Gate,
    delete: bool,
}

impl DnsReconciler {
    /// Create a DNS reconciler.
    ///
    /// # Arguments
    /// * `tunnel_id` - Tunnel the records point at
    /// * `marker` - Comment written to, and required on, records this controller owns
    /// * `gate` - Management and dry-run switches for creates and updates
    /// * `delete` - Remove owned records whose hostname is no longer desired
    pub fn new(api: impl DnsApi + 'static, tunnel_id: &str, marker: OwnershipMarker, gate: Gate, delete: bool) -> Self {
        Self {
            api: Box::new(api),
            target: tunnel_target(tunnel_id),
            marker,
            gate,
            delete,
        }
    }

    /// Run one DNS pass.
    ///
    /// Fails only when zones cannot be listed; per-record failures are logged
    /// and counted.
    pub async fn reconcile(&self, routes: &[RouteSpec]) -> Result<DnsSummary, ControllerError> {
        let mut summary = DnsSummary::default();
        if !self.gate.manage && !self.delete {
            debug!("DNS management disabled; skipping DNS sync");
            return Ok(summary);
        }

        let hostnames = desired_hostnames(routes);
        if hostnames.is_empty() && !self.delete {
            debug!("No route hostnames; skipping DNS sync");
            return Ok(summary);
        }

        let zones = self.api.list_zones().await?;
        if zones.is_empty() {
            warn!("No zones returned for the account; DNS sync skipped");
            return Ok(summary);
        }

        let (claims, unclaimed) = claim_hostnames(&hostnames, &zones);
        for hostname in &unclaimed {
            warn!("No zone found for hostname {}; skipping DNS record", hostname);
        }

        for claim in &claims {
            if self.delete {
                self.delete_stale_records(claim, &mut summary).await;
            }
            if !self.gate.manage {
                continue;
            }
            for hostname in &claim.hostnames {
                self.upsert_record(&claim.zone, hostname, &mut summary).await;
            }
        }

        Ok(summary)
    }

    fn desired_record(&self, hostname: &str) -> DnsRecordInput {
        DnsRecordInput {
            record_type: RECORD_TYPE.to_string(),
            name: hostname.to_string(),
            content: self.target.clone(),
            proxied: true,
            ttl: AUTOMATIC_TTL,
            comment: Some(self.marker.as_str().to_string()),
        }
    }

    /// Owned, or already pointing at the tunnel.
    fn may_update(&self, record: &DnsRecord) -> bool {
        self.marker.matches(record.comment_str()) || record.content.eq_ignore_ascii_case(&self.target)
    }

    fn is_up_to_date(&self, record: &DnsRecord) -> bool {
        record.content.eq_ignore_ascii_case(&self.target) && record.proxied && self.marker.matches(record.comment_str())
    }

    async fn delete_stale_records(&self, claim: &ZoneClaim, summary: &mut DnsSummary) {
        let zone = &claim.zone;
        let records = match self.api.list_dns_records(&zone.id, Some(RECORD_TYPE), None).await {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to list DNS records in zone {}: {}", zone.name, e);
                summary.failed += 1;
                return;
            }
        };

        for record in records {
            let hostname = normalize_hostname(&record.name);
            if claim.hostnames.contains(&hostname) || !self.marker.matches(record.comment_str()) {
                continue;
            }

            warn!("DNS record {} in zone {} is no longer desired; deleting", hostname, zone.name);
            if self.gate.dry_run {
                info!("[dry-run] Would delete DNS record {} in zone {}", hostname, zone.name);
                summary.skipped += 1;
                continue;
            }
            match self.api.delete_dns_record(&zone.id, &record.id).await {
                Ok(()) => summary.deleted += 1,
                Err(e) => {
                    error!("Failed to delete DNS record {} in zone {}: {}", hostname, zone.name, e);
                    summary.failed += 1;
                }
            }
        }
    }

    async fn upsert_record(&self, zone: &Zone, hostname: &str, summary: &mut DnsSummary) {
        let existing = match self.api.list_dns_records(&zone.id, Some(RECORD_TYPE), Some(hostname)).await {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to list DNS records for {} in zone {}: {}", hostname, zone.name, e);
                summary.failed += 1;
                return;
            }
        };

        let desired = self.desired_record(hostname);
        let record = match existing.as_slice() {
            [] => {
                if self.gate.dry_run {
                    info!("[dry-run] Would create DNS record {} -> {} in zone {}", hostname, self.target, zone.name);
                    summary.skipped += 1;
                    return;
                }
                info!("Creating DNS record {} -> {} in zone {}", hostname, self.target, zone.name);
                match self.api.create_dns_record(&zone.id, &desired).await {
                    Ok(_) => summary.created += 1,
                    Err(e) => {
                        error!("Failed to create DNS record {} in zone {}: {}", hostname, zone.name, e);
                        summary.failed += 1;
                    }
                }
                return;
            }
            [record] => record,
            _ => {
                warn!(
                    "Found {} DNS records for {} in zone {}; skipping ambiguous hostname",
                    existing.len(),
                    hostname,
                    zone.name
                );
                summary.skipped += 1;
                return;
            }
        };

        if !record.record_type.eq_ignore_ascii_case(RECORD_TYPE) {
            debug!("DNS record {} in zone {} is type {}; skipping", hostname, zone.name, record.record_type);
            summary.skipped += 1;
            return;
        }
        if !self.may_update(record) {
            warn!(
                "DNS record {} in zone {} is not managed by this controller (content {}); skipping",
                hostname, zone.name, record.content
            );
            summary.skipped += 1;
            return;
        }
        if self.is_up_to_date(record) {
            debug!("DNS record {} in zone {} up to date", hostname, zone.name);
            return;
        }

        if self.gate.dry_run {
            info!("[dry-run] Would update DNS record {} -> {} in zone {}", hostname, self.target, zone.name);
            summary.skipped += 1;
            return;
        }
        info!("Updating DNS record {} -> {} in zone {}", hostname, self.target, zone.name);
        match self.api.update_dns_record(&zone.id, &record.id, &desired).await {
            Ok(_) => summary.updated += 1,
            Err(e) => {
                error!("Failed to update DNS record {} in zone {}: {}", hostname, zone.name, e);
                summary.failed += 1;
            }
        }
    }
}
