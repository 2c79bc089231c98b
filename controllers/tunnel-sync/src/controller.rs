//! Main controller implementation.
//!
//! This module contains the `Controller` struct that polls Docker and drives
//! one sync pass per tick:
//! containers → routes → ingress → DNS → Access labels → Access.
//!
//! A failure in one reconciler is logged and the pass continues with the next.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::labels;
use crate::reconciler::{
    AccessReconciler, AccessSummary, DnsReconciler, DnsSummary, Gate, IngressReconciler, IngressSummary,
};
use cloudflare_client::{AccessApi, DnsApi, TunnelConfigApi};
use docker_client::ContainerSource;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// What one sync pass did. `None` means the reconciler failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub containers: usize,
    pub routes: usize,
    pub access_apps: usize,
    pub label_errors: usize,
    pub ingress: Option<IngressSummary>,
    pub dns: Option<DnsSummary>,
    pub access: Option<AccessSummary>,
}

/// Main controller for tunnel, DNS and Access synchronization.
pub struct Controller {
    containers: Box<dyn ContainerSource + Send + Sync>,
    ingress: IngressReconciler,
    dns: DnsReconciler,
    access: AccessReconciler,
    poll_interval: Duration,
    run_once: bool,
}

impl Controller {
    /// Creates a new controller instance.
    ///
    /// `cloudflare` is cloned into each reconciler; every reconciler only sees
    /// its own capability trait.
    pub fn new<C>(
        containers: impl ContainerSource + 'static,
        cloudflare: C,
        tunnel_id: &str,
        config: &ControllerConfig,
    ) -> Self
    where
        C: TunnelConfigApi + DnsApi + AccessApi + Clone + 'static,
    {
        let marker = config.ownership_marker();
        Self {
            containers: Box::new(containers),
            ingress: IngressReconciler::new(cloudflare.clone(), Gate::new(config.manage_tunnel, config.dry_run)),
            dns: DnsReconciler::new(
                cloudflare.clone(),
                tunnel_id,
                marker.clone(),
                Gate::new(config.manage_dns, config.dry_run),
                config.delete_dns,
            ),
            access: AccessReconciler::new(cloudflare, marker, Gate::new(config.manage_access, config.dry_run)),
            poll_interval: config.poll_interval,
            run_once: config.run_once,
        }
    }

    /// Run until SIGINT/SIGTERM, or after one pass in run-once mode.
    pub async fn run(&self) -> Result<(), ControllerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` resolves. The in-flight pass is dropped on shutdown.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), ControllerError>
    where
        F: Future<Output = Result<(), ControllerError>>,
    {
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately, giving the initial pass.
            tokio::select! {
                result = &mut shutdown => {
                    result?;
                    info!("Shutdown signal received; stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            tokio::select! {
                result = &mut shutdown => {
                    result?;
                    info!("Shutdown signal received during sync pass; stopping");
                    return Ok(());
                }
                result = self.sync_once() => {
                    if let Err(e) = result {
                        error!("Sync pass failed: {}", e);
                    }
                }
            }

            if self.run_once {
                info!("Run-once mode: single sync pass complete");
                return Ok(());
            }
        }
    }

    /// One full sync pass.
    ///
    /// Fails only when containers cannot be listed.
    pub async fn sync_once(&self) -> Result<SyncReport, ControllerError> {
        let containers = self.containers.list_running_containers().await?;
        debug!("Listed {} running containers", containers.len());

        let mut report = SyncReport {
            containers: containers.len(),
            ..Default::default()
        };

        let (routes, route_errors) = labels::parse_routes(&containers);
        for e in &route_errors {
            warn!("Tunnel label error: {}", e);
        }
        report.routes = routes.len();
        report.label_errors += route_errors.len();

        report.ingress = match self.ingress.reconcile(&routes).await {
            Ok(summary) => {
                info!(
                    "Ingress sync: {} desired, {} existing, {} removed, written: {}",
                    summary.desired, summary.existing, summary.removed, summary.written
                );
                Some(summary)
            }
            Err(e) => {
                error!("Ingress sync failed: {}", e);
                None
            }
        };

        report.dns = match self.dns.reconcile(&routes).await {
            Ok(summary) => {
                info!(
                    "DNS sync: {} created, {} updated, {} deleted, {} skipped, {} failed",
                    summary.created, summary.updated, summary.deleted, summary.skipped, summary.failed
                );
                Some(summary)
            }
            Err(e) => {
                error!("DNS sync failed: {}", e);
                None
            }
        };

        let (apps, access_errors) = labels::parse_access_apps(&containers);
        for e in &access_errors {
            warn!("Access label error: {}", e);
        }
        report.access_apps = apps.len();
        report.label_errors += access_errors.len();

        report.access = match self.access.reconcile(&apps).await {
            Ok(summary) => {
                info!(
                    "Access sync: {} created, {} updated, {} unchanged, {} deleted, {} aborted, {} skipped, {} failed",
                    summary.created,
                    summary.updated,
                    summary.unchanged,
                    summary.deleted,
                    summary.aborted,
                    summary.skipped,
                    summary.failed
                );
                Some(summary)
            }
            Err(e) => {
                error!("Access sync failed: {}", e);
                None
            }
        };

        Ok(report)
    }
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() -> Result<(), ControllerError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}
