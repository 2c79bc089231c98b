//! Unit tests for the controller sync pass and run loop

#[cfg(test)]
mod tests {
    use crate::config::ControllerConfig;
    use crate::controller::*;
    use crate::error::ControllerError;
    use crate::test_utils::*;
    use cloudflare_client::{IngressRule, MockCloudflareClient, Zone};
    use std::time::Duration;
    use tunnel_model::{DEFAULT_MANAGED_BY, FALLBACK_SERVICE};

    fn config(manage: bool, dry_run: bool, run_once: bool) -> ControllerConfig {
        ControllerConfig {
            poll_interval: Duration::from_secs(3600),
            run_once,
            dry_run,
            manage_tunnel: manage,
            manage_dns: manage,
            delete_dns: manage,
            manage_access: manage,
            managed_by: DEFAULT_MANAGED_BY.to_string(),
        }
    }

    fn web_container() -> docker_client::ContainerInfo {
        container(
            "c1",
            "web",
            &[
                ("cloudflare.tunnel.enable", "true"),
                ("cloudflare.tunnel.hostname", "app.example.com"),
                ("cloudflare.tunnel.service", "http://web:8080"),
                ("cloudflare.access.enable", "true"),
                ("cloudflare.access.app.name", "app"),
                ("cloudflare.access.policy.1.name", "allow"),
                ("cloudflare.access.policy.1.action", "allow"),
                ("cloudflare.access.policy.1.include.emails", "u@example.com"),
            ],
        )
    }

    fn mock_with_zone() -> MockCloudflareClient {
        let mock = MockCloudflareClient::new();
        mock.add_zone(Zone::new("z1", "example.com"));
        mock
    }

    #[tokio::test]
    async fn test_sync_pass_reconciles_all_resources() {
        let mock = mock_with_zone();
        let source = StaticContainers::new(vec![web_container()]);
        let controller = Controller::new(source, mock.clone(), TUNNEL_ID, &config(true, false, true));

        let report = controller.sync_once().await.unwrap();

        assert_eq!(report.containers, 1);
        assert_eq!(report.routes, 1);
        assert_eq!(report.access_apps, 1);
        assert_eq!(report.label_errors, 0);
        assert!(report.ingress.as_ref().is_some_and(|s| s.written));
        assert_eq!(report.dns.as_ref().map(|s| s.created), Some(1));
        assert_eq!(report.access.as_ref().map(|s| s.created), Some(1));

        assert_eq!(
            mock.tunnel_config().ingress,
            vec![
                IngressRule::new("app.example.com", "", "http://web:8080"),
                IngressRule::catch_all(FALLBACK_SERVICE),
            ]
        );
        assert_eq!(mock.dns_records("z1")[0].content, "tunnel-1.cfargotunnel.com");
        assert_eq!(mock.access_apps()[0].domain, "app.example.com");

        mock.clear_calls();
        controller.sync_once().await.unwrap();
        assert_eq!(mock.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_removed_container_cleans_up_owned_resources() {
        let mock = mock_with_zone();
        let source = StaticContainers::new(vec![web_container()]);
        let controller = Controller::new(source.clone(), mock.clone(), TUNNEL_ID, &config(true, false, true));
        controller.sync_once().await.unwrap();

        source.set(Vec::new());
        let report = controller.sync_once().await.unwrap();

        assert_eq!(mock.tunnel_config().ingress, vec![IngressRule::catch_all(FALLBACK_SERVICE)]);
        assert!(mock.dns_records("z1").is_empty());
        assert!(mock.access_apps().is_empty());
        assert_eq!(report.dns.map(|s| s.deleted), Some(1));
        assert_eq!(report.access.map(|s| s.deleted), Some(1));
    }

    #[tokio::test]
    async fn test_container_listing_failure_fails_the_pass() {
        let mock = mock_with_zone();
        let source = StaticContainers::new(vec![web_container()]);
        source.fail();
        let controller = Controller::new(source, mock.clone(), TUNNEL_ID, &config(true, false, true));

        let result = controller.sync_once().await;

        assert!(matches!(result, Err(ControllerError::Docker(_))));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_ingress_failure_does_not_stop_dns_or_access() {
        let mock = mock_with_zone();
        mock.fail_tunnel_config_update();
        let source = StaticContainers::new(vec![web_container()]);
        let controller = Controller::new(source, mock.clone(), TUNNEL_ID, &config(true, false, true));

        let report = controller.sync_once().await.unwrap();

        assert!(report.ingress.is_none());
        assert_eq!(report.dns.map(|s| s.created), Some(1));
        assert_eq!(report.access.map(|s| s.created), Some(1));
    }

    #[tokio::test]
    async fn test_label_errors_are_counted_and_valid_routes_proceed() {
        let mock = mock_with_zone();
        let broken = container(
            "c0",
            "broken",
            &[
                ("cloudflare.tunnel.enable", "true"),
                ("cloudflare.tunnel.hostname", "broken.example.com"),
            ],
        );
        let source = StaticContainers::new(vec![broken, web_container()]);
        let controller = Controller::new(source, mock.clone(), TUNNEL_ID, &config(true, false, true));

        let report = controller.sync_once().await.unwrap();

        assert_eq!(report.label_errors, 1);
        assert_eq!(report.routes, 1);
        assert_eq!(mock.dns_records("z1").len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_pass_makes_no_mutations() {
        let mock = mock_with_zone();
        let source = StaticContainers::new(vec![web_container()]);
        let controller = Controller::new(source, mock.clone(), TUNNEL_ID, &config(true, true, true));

        controller.sync_once().await.unwrap();

        assert_eq!(mock.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_run_once_returns_after_single_pass() {
        let mock = mock_with_zone();
        let source = StaticContainers::new(vec![web_container()]);
        let controller = Controller::new(source, mock.clone(), TUNNEL_ID, &config(true, false, true));

        controller
            .run_until(std::future::pending::<Result<(), ControllerError>>())
            .await
            .unwrap();

        assert_eq!(mock.dns_records("z1").len(), 1);
    }

    #[tokio::test]
    async fn test_run_once_survives_failed_pass() {
        let source = StaticContainers::new(Vec::new());
        source.fail();
        let controller = Controller::new(source, mock_with_zone(), TUNNEL_ID, &config(true, false, true));

        let result = controller
            .run_until(std::future::pending::<Result<(), ControllerError>>())
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_loop() {
        let source = StaticContainers::new(Vec::new());
        let controller = Controller::new(source, mock_with_zone(), TUNNEL_ID, &config(true, false, false));

        let result = controller.run_until(async { Ok(()) }).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_signal_error_is_returned() {
        let source = StaticContainers::new(Vec::new());
        let controller = Controller::new(source, mock_with_zone(), TUNNEL_ID, &config(true, false, false));

        let result = controller
            .run_until(async { Err(ControllerError::Shutdown(std::io::Error::other("no signal handler"))) })
            .await;

        assert!(matches!(result, Err(ControllerError::Shutdown(_))));
    }
}
