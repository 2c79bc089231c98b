//! Unit tests for the ingress reconciler

#[cfg(test)]
mod tests {
    use crate::reconciler::Gate;
    use crate::reconciler::ingress::*;
    use crate::test_utils::*;
    use cloudflare_client::{IngressRule, MockCall, MockCloudflareClient, TunnelConfig};
    use serde_json::json;
    use tunnel_model::FALLBACK_SERVICE;

    fn live_rules(mock: &MockCloudflareClient) -> Vec<IngressRule> {
        mock.tunnel_config().ingress
    }

    #[tokio::test]
    async fn test_replaces_foreign_rule_when_managed() {
        let mock = MockCloudflareClient::new();
        mock.set_ingress(vec![
            IngressRule::new("b.example.com", "", "http://b"),
            IngressRule::catch_all(FALLBACK_SERVICE),
        ]);
        let reconciler = IngressReconciler::new(mock.clone(), Gate::new(true, false));

        let summary = reconciler
            .reconcile(&[route("a.example.com", "", "http://a:80")])
            .await
            .unwrap();

        assert_eq!(
            live_rules(&mock),
            vec![
                IngressRule::new("a.example.com", "", "http://a:80"),
                IngressRule::catch_all(FALLBACK_SERVICE),
            ]
        );
        assert_eq!(mock.calls(), vec![MockCall::UpdateTunnelConfig]);
        assert_eq!(
            summary,
            IngressSummary {
                desired: 2,
                existing: 2,
                removed: 1,
                written: true,
            }
        );
    }

    #[tokio::test]
    async fn test_read_only_when_management_disabled() {
        let mock = MockCloudflareClient::new();
        let before = vec![
            IngressRule::new("b.example.com", "", "http://b"),
            IngressRule::catch_all(FALLBACK_SERVICE),
        ];
        mock.set_ingress(before.clone());
        let reconciler = IngressReconciler::new(mock.clone(), Gate::new(false, false));

        let summary = reconciler
            .reconcile(&[route("a.example.com", "", "http://a:80")])
            .await
            .unwrap();

        assert_eq!(mock.mutation_count(), 0);
        assert_eq!(live_rules(&mock), before);
        assert_eq!(summary.removed, 1);
        assert!(!summary.written);
    }

    #[tokio::test]
    async fn test_dry_run_never_writes() {
        let mock = MockCloudflareClient::new();
        let reconciler = IngressReconciler::new(mock.clone(), Gate::new(true, true));

        let summary = reconciler
            .reconcile(&[route("a.example.com", "", "http://a:80")])
            .await
            .unwrap();

        assert_eq!(mock.mutation_count(), 0);
        assert!(!summary.written);
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let mock = MockCloudflareClient::new();
        let reconciler = IngressReconciler::new(mock.clone(), Gate::new(true, false));
        let mut with_origin = route("c.example.com", "/x", "https://c:443");
        with_origin.no_tls_verify = Some(true);
        let desired = vec![
            route("b.example.com", "", "http://b"),
            with_origin,
            route("a.example.com", "", "http://a"),
        ];

        reconciler.reconcile(&desired).await.unwrap();
        assert_eq!(mock.mutation_count(), 1);

        let summary = reconciler.reconcile(&desired).await.unwrap();
        assert_eq!(mock.mutation_count(), 1);
        assert!(!summary.written);
    }

    #[tokio::test]
    async fn test_unmanaged_origin_keys_and_config_keys_survive() {
        let mock = MockCloudflareClient::new();
        let mut live = IngressRule::new("a.example.com", "", "http://a:80");
        live.origin_request = Some(json!({ "connectTimeout": "10s", "noTLSVerify": true }));
        let mut catch_all = IngressRule::catch_all(FALLBACK_SERVICE);
        catch_all.origin_request = Some(json!({ "keepAliveTimeout": "1m" }));
        let mut config = TunnelConfig {
            ingress: vec![live, catch_all.clone()],
            ..Default::default()
        };
        config.other.insert("warp-routing".to_string(), json!({ "enabled": true }));
        mock.set_tunnel_config(config);

        let mut desired = route("a.example.com", "", "http://a:80");
        desired.origin_server_name = Some("a.internal".to_string());
        IngressReconciler::new(mock.clone(), Gate::new(true, false))
            .reconcile(&[desired])
            .await
            .unwrap();

        let written = mock.tunnel_config();
        assert_eq!(
            written.ingress[0].origin_request,
            Some(json!({ "connectTimeout": "10s", "originServerName": "a.internal" }))
        );
        assert_eq!(written.ingress[1], catch_all);
        assert_eq!(written.other.get("warp-routing"), Some(&json!({ "enabled": true })));
    }

    #[tokio::test]
    async fn test_write_failure_is_returned() {
        let mock = MockCloudflareClient::new();
        mock.fail_tunnel_config_update();
        let reconciler = IngressReconciler::new(mock.clone(), Gate::new(true, false));

        let result = reconciler.reconcile(&[route("a.example.com", "", "http://a")]).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_plan_ends_with_single_catch_all() {
        let existing = vec![
            IngressRule::catch_all("http_status:503"),
            IngressRule::new("z.example.com", "", "http://z"),
            IngressRule::new("z.example.com", "", "http://z-duplicate"),
            IngressRule::catch_all(FALLBACK_SERVICE),
            IngressRule::catch_all(FALLBACK_SERVICE),
        ];
        let desired = vec![
            route("m.example.com", "/b", "http://m2"),
            route("m.example.com", "", "http://m"),
        ];

        let plan = plan_ingress(&desired, &existing);

        let keys: Vec<(&str, &str)> = plan
            .rules
            .iter()
            .map(|r| (r.hostname.as_str(), r.path.as_str()))
            .collect();
        assert_eq!(keys, vec![("m.example.com", ""), ("m.example.com", "/b"), ("", "")]);
        assert_eq!(plan.rules.iter().filter(|r| r.hostname.is_empty()).count(), 1);
        assert_eq!(plan.rules.last().map(|r| r.service.as_str()), Some(FALLBACK_SERVICE));
        assert_eq!(plan.removed, vec![IngressRule::new("z.example.com", "", "http://z")]);
    }

    #[test]
    fn test_plan_rebuilds_invalid_origin_request() {
        let mut live = IngressRule::new("a.example.com", "", "http://a");
        live.origin_request = Some(json!("not-an-object"));
        let plan = plan_ingress(&[route("a.example.com", "", "http://a")], &[live]);
        assert_eq!(plan.rules[0].origin_request, None);
    }
}
