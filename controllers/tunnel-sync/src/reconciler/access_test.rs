//! Unit tests for the Access reconciler

#[cfg(test)]
mod tests {
    use crate::reconciler::Gate;
    use crate::reconciler::access::*;
    use crate::test_utils::*;
    use cloudflare_client::{AccessAppInput, AccessRule, MockCall, MockCloudflareClient, PolicyRef};
    use tunnel_model::AccessPolicySpec;

    fn reconciler(mock: &MockCloudflareClient, gate: Gate) -> AccessReconciler {
        AccessReconciler::new(mock.clone(), marker(), gate)
    }

    fn scenario_app() -> tunnel_model::AccessAppSpec {
        app_spec("app", "app.example.com", vec![allow_emails("allow", &["u@example.com"])])
    }

    #[tokio::test]
    async fn test_creates_policy_and_tagged_app() {
        let mock = MockCloudflareClient::new();
        let access = reconciler(&mock, Gate::new(true, false));

        let summary = access.reconcile(&[scenario_app()]).await.unwrap();

        let marker_tag = marker().as_str().to_string();
        assert_eq!(
            mock.calls(),
            vec![
                MockCall::CreateAccessTag {
                    name: marker_tag.clone()
                },
                MockCall::CreateAccessPolicy {
                    name: "allow".to_string()
                },
                MockCall::CreateAccessApp {
                    name: "app".to_string()
                },
            ]
        );

        let policy = &mock.access_policies()[0];
        assert_eq!(policy.action, "allow");
        assert_eq!(policy.include, vec![AccessRule::Email("u@example.com".to_string())]);

        let app = &mock.access_apps()[0];
        assert_eq!(app.domain, "app.example.com");
        assert_eq!(app.app_type, "self_hosted");
        assert_eq!(app.policies, vec![PolicyRef::new(policy.id.clone(), 1)]);
        assert_eq!(app.tags, vec![marker_tag]);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.policies_created, 1);
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let mock = MockCloudflareClient::new();
        let access = reconciler(&mock, Gate::new(true, false));
        let mut app = scenario_app();
        app.tags = Some(vec!["team".to_string()]);
        app.policies.push(AccessPolicySpec::reference_id("app-scoped"));

        access.reconcile(std::slice::from_ref(&app)).await.unwrap();
        mock.clear_calls();

        let summary = access.reconcile(&[app]).await.unwrap();
        assert_eq!(mock.calls(), vec![]);
        assert_eq!(summary.unchanged, 1);
    }

    #[tokio::test]
    async fn test_ambiguous_app_is_skipped() {
        let mock = MockCloudflareClient::new();
        mock.add_access_tag(marker().as_str());
        mock.add_access_policy(live_policy("p1", "allow", "allow", &["u@example.com"]));
        mock.add_access_app(live_app("a1", "app", "app.example.com", &["p1"], &[]));
        mock.add_access_app(live_app("a2", "App", "APP.example.com", &["p1"], &[]));
        let access = reconciler(&mock, Gate::new(true, false));

        let summary = access.reconcile(&[scenario_app()]).await.unwrap();

        assert_eq!(mock.mutation_count(), 0);
        assert_eq!(summary.aborted, 1);
        assert_eq!(mock.access_apps().len(), 2);
    }

    #[tokio::test]
    async fn test_orphan_deletion_requires_marker() {
        let mock = MockCloudflareClient::new();
        let marker_tag = marker().as_str().to_string();
        mock.add_access_app(live_app("owned", "old", "old.example.com", &["p"], &[&marker_tag]));
        mock.add_access_app(live_app("foreign", "old", "old.example.com", &["p"], &["team"]));
        let access = reconciler(&mock, Gate::new(true, false));

        let summary = access.reconcile(&[]).await.unwrap();

        assert_eq!(
            mock.calls(),
            vec![MockCall::DeleteAccessApp {
                id: "owned".to_string()
            }]
        );
        assert_eq!(summary.deleted, 1);
        let remaining: Vec<String> = mock.access_apps().into_iter().map(|a| a.id).collect();
        assert_eq!(remaining, vec!["foreign".to_string()]);
    }

    #[tokio::test]
    async fn test_management_disabled_is_read_only() {
        let mock = MockCloudflareClient::new();
        let marker_tag = marker().as_str().to_string();
        mock.add_access_app(live_app("owned", "old", "old.example.com", &["p"], &[&marker_tag]));
        let access = reconciler(&mock, Gate::new(false, false));

        let summary = access.reconcile(&[scenario_app()]).await.unwrap();

        assert_eq!(mock.mutation_count(), 0);
        assert_eq!(summary.skipped, 1);
        assert_eq!(mock.access_apps().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_is_read_only() {
        let mock = MockCloudflareClient::new();
        let marker_tag = marker().as_str().to_string();
        mock.add_access_app(live_app("owned", "old", "old.example.com", &["p"], &[&marker_tag]));
        mock.add_access_policy(live_policy("p1", "allow", "allow", &["someone@example.com"]));
        let access = reconciler(&mock, Gate::new(true, true));

        let mut app = scenario_app();
        app.tags = Some(vec!["team".to_string()]);
        access.reconcile(&[app]).await.unwrap();

        assert_eq!(mock.mutation_count(), 0);
        assert_eq!(mock.access_apps().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_tag_keeps_live_tags() {
        let mock = MockCloudflareClient::new();
        mock.add_access_policy(live_policy("p1", "allow", "allow", &["u@example.com"]));
        mock.add_access_app(live_app("a1", "app", "app.example.com", &["p1"], &["legacy"]));
        mock.fail_access_tag("team");
        let access = reconciler(&mock, Gate::new(true, false));

        let mut app = scenario_app();
        app.tags = Some(vec!["other".to_string(), "team".to_string()]);
        let summary = access.reconcile(&[app]).await.unwrap();

        assert_eq!(summary.updated, 1);
        let tags = &mock.access_apps()[0].tags;
        assert_eq!(tags, &vec!["legacy".to_string(), marker().as_str().to_string()]);
    }

    #[tokio::test]
    async fn test_explicit_empty_tags_clear_live_tags() {
        let mock = MockCloudflareClient::new();
        mock.add_access_policy(live_policy("p1", "allow", "allow", &["u@example.com"]));
        mock.add_access_app(live_app("a1", "app", "app.example.com", &["p1"], &["legacy"]));
        let access = reconciler(&mock, Gate::new(true, false));

        let mut app = scenario_app();
        app.tags = Some(Vec::new());
        access.reconcile(&[app]).await.unwrap();

        assert_eq!(mock.access_apps()[0].tags, vec![marker().as_str().to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_reference_id_is_attached_anyway() {
        let mock = MockCloudflareClient::new();
        let access = reconciler(&mock, Gate::new(true, false));
        let app = app_spec("app", "app.example.com", vec![AccessPolicySpec::reference_id("app-scoped")]);

        access.reconcile(&[app]).await.unwrap();

        assert_eq!(mock.access_apps()[0].policies, vec![PolicyRef::new("app-scoped", 1)]);
    }

    #[tokio::test]
    async fn test_unresolvable_policies_abort_the_app() {
        let mock = MockCloudflareClient::new();
        mock.add_access_tag(marker().as_str());
        mock.add_access_policy(live_policy("d1", "dup", "allow", &[]));
        mock.add_access_policy(live_policy("d2", "DUP", "allow", &[]));
        let access = reconciler(&mock, Gate::new(true, false));

        let mut managed_by_missing_id = allow_emails("x", &["x@example.com"]);
        managed_by_missing_id.id = Some("missing".to_string());
        let apps = [
            app_spec("a", "a.example.com", vec![managed_by_missing_id]),
            app_spec("b", "b.example.com", vec![AccessPolicySpec::reference_name("nope")]),
            app_spec("c", "c.example.com", vec![AccessPolicySpec::reference_name("dup")]),
        ];

        let summary = access.reconcile(&apps).await.unwrap();

        assert_eq!(summary.aborted, 3);
        assert_eq!(mock.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_explicit_app_id_is_not_created() {
        let mock = MockCloudflareClient::new();
        mock.add_access_tag(marker().as_str());
        let access = reconciler(&mock, Gate::new(true, false));
        let mut app = app_spec("app", "app.example.com", vec![AccessPolicySpec::reference_id("p")]);
        app.id = Some("gone".to_string());

        let summary = access.reconcile(&[app]).await.unwrap();

        assert_eq!(summary.aborted, 1);
        assert_eq!(mock.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_shared_managed_policy_is_updated_once() {
        let mock = MockCloudflareClient::new();
        mock.add_access_tag(marker().as_str());
        mock.add_access_policy(live_policy("p1", "ops", "allow", &["a@example.com"]));
        let access = reconciler(&mock, Gate::new(true, false));
        let policy = allow_emails("ops", &["a@example.com", "b@example.com"]);
        let apps = [
            app_spec("one", "one.example.com", vec![policy.clone()]),
            app_spec("two", "two.example.com", vec![policy]),
        ];

        let summary = access.reconcile(&apps).await.unwrap();

        let policy_updates = mock
            .calls()
            .into_iter()
            .filter(|c| matches!(c, MockCall::UpdateAccessPolicy { .. }))
            .count();
        assert_eq!(policy_updates, 1);
        assert_eq!(summary.policies_updated, 1);
        assert_eq!(summary.created, 2);
        assert_eq!(mock.access_policies()[0].include.len(), 2);
    }

    #[test]
    fn test_empty_remote_type_does_not_force_update() {
        let mut live = live_app("a1", "app", "app.example.com", &["p2", "p1"], &["t", "m"]);
        live.app_type = String::new();
        live.policies = vec![PolicyRef::new("p1", 1), PolicyRef::new("p2", 2)];
        let desired = AccessAppInput {
            name: "app".to_string(),
            domain: "app.example.com".to_string(),
            app_type: "self_hosted".to_string(),
            policies: vec![PolicyRef::new("p1", 1), PolicyRef::new("p2", 2)],
            tags: vec!["m".to_string(), "t".to_string()],
        };
        assert!(!app_needs_update(&live, &desired));

        live.app_type = "ssh".to_string();
        assert!(app_needs_update(&live, &desired));

        live.app_type = "self_hosted".to_string();
        live.policies = vec![PolicyRef::new("p2", 1), PolicyRef::new("p1", 2)];
        assert!(app_needs_update(&live, &desired));
    }

    #[test]
    fn test_policy_needs_update_compares_action_and_rules() {
        let spec = allow_emails("ops", &["A@example.com"]);
        assert!(!policy_needs_update(&spec, &live_policy("p", "ops", "allow", &["a@example.com"])));
        assert!(policy_needs_update(&spec, &live_policy("p", "ops", "deny", &["a@example.com"])));
        assert!(policy_needs_update(&spec, &live_policy("p", "ops", "allow", &[])));
    }
}
