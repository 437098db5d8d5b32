//! Per-target failure isolation, retries and timeouts.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use lzstack_core::{Deployment, OwnershipRule, SharedResource};
    use lzstack_model::{
        AwsRegion, ErrorKind, StackState, Target, TemplateLocation, TemplateRef, UpsertOutcome,
    };

    use crate::{Harness, account_id, fast_config};

    const BASELINE: &str = r#"{"Resources":{}}"#;

    fn baseline(rule: OwnershipRule) -> Deployment {
        Deployment::builder()
            .rule(rule)
            .stack_name("LZ-baseline")
            .template(TemplateRef::Inline(BASELINE.to_owned()))
            .build()
    }

    fn workloads() -> OwnershipRule {
        OwnershipRule::AccountSet(vec!["dev".to_owned(), "prod".to_owned()])
    }

    #[tokio::test]
    async fn test_should_isolate_denied_target() {
        let harness = Harness::new();
        harness.trust.deny(account_id("444444444444"));

        let report = harness.orchestrator.deploy(&baseline(workloads())).await.unwrap();

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.succeeded[0].target, Target::new("dev", "us-east-1"));
        assert_eq!(report.failed.len(), 1);
        let failure = &report.failed[0];
        assert_eq!(failure.target, Target::new("prod", "us-east-1"));
        assert_eq!(failure.kind, ErrorKind::AssumeRoleDenied);
        assert!(!failure.retry_safe);
        // denial is not retried
        assert_eq!(harness.trust.calls(), 2);
    }

    #[tokio::test]
    async fn test_should_ride_out_transient_throttling() {
        let harness = Harness::new();
        harness.trust.throttle_next(2);

        let report = harness
            .orchestrator
            .deploy(&baseline(OwnershipRule::SingleAccount("dev".to_owned())))
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.succeeded[0].outcome, UpsertOutcome::Created);
        assert_eq!(harness.trust.calls(), 3);
    }

    #[tokio::test]
    async fn test_should_report_persistent_provider_throttling() {
        let harness = Harness::new();
        harness.provider.fail_next(ErrorKind::Throttled, 100);

        let report = harness
            .orchestrator
            .deploy(&baseline(OwnershipRule::SingleAccount("dev".to_owned())))
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].kind, ErrorKind::Throttled);
        assert!(report.is_retry_safe());
        assert_eq!(harness.provider.creates(), 0);
    }

    #[tokio::test]
    async fn test_should_time_out_stalled_stack_and_leave_handle_missing() {
        let config = {
            let mut config = fast_config();
            config.upsert_timeout_secs = 0;
            config
        };
        let harness = Harness::with_config(&config);
        harness.provider.set_stalled(true);

        let report = harness
            .orchestrator
            .deploy(&baseline(OwnershipRule::SingleAccount("dev".to_owned())))
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].kind, ErrorKind::UpsertTimedOut);
        assert!(report.failed[0].retry_safe);

        let handle = harness
            .orchestrator
            .registry()
            .try_get(&Target::new("dev", "us-east-1"))
            .unwrap();
        assert_eq!(handle.state(), StackState::Missing);
    }

    #[tokio::test]
    async fn test_should_abort_run_when_shared_template_is_missing() {
        let harness = Harness::new();
        let deployment = Deployment::builder()
            .rule(OwnershipRule::AllAccounts)
            .regions(vec![AwsRegion::new("us-east-1"), AwsRegion::new("eu-west-1")])
            .stack_name("LZ-baseline")
            .template(TemplateRef::Location(TemplateLocation::parse(
                "s3://templates/missing.yaml",
            )))
            .build();

        let err = harness.orchestrator.deploy(&deployment).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::TemplateNotFound);
        assert!(err.kind.is_run_fatal());
        assert_eq!(harness.trust.calls(), 0);
        assert_eq!(harness.provider.describes(), 0);
        assert!(harness.orchestrator.registry().is_empty());
    }

    #[tokio::test]
    async fn test_should_abort_shared_allocation_when_template_is_missing() {
        let harness = Harness::new();
        let resource = SharedResource::builder()
            .kind("ebs-default-key")
            .rule(workloads())
            .stack_name("LZ-ebs-key")
            .template(TemplateRef::Location(TemplateLocation::parse(
                "s3://templates/kms.yaml",
            )))
            .build();

        let err = harness
            .orchestrator
            .ensure_shared(&resource)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::TemplateNotFound);
        assert!(harness.orchestrator.allocator().is_empty());
        assert_eq!(harness.provider.creates(), 0);
    }

    #[tokio::test]
    async fn test_should_use_template_from_store() {
        let harness = Harness::new();
        let location = TemplateLocation::parse("s3://templates/baseline.json");
        harness.templates.insert(&location, BASELINE);

        let report = harness
            .orchestrator
            .deploy(
                &Deployment::builder()
                    .rule(OwnershipRule::SingleAccount("dev".to_owned()))
                    .stack_name("LZ-baseline")
                    .template(TemplateRef::Location(location))
                    .build(),
            )
            .await
            .unwrap();

        assert!(report.is_success());
        let stack = harness
            .provider
            .stack(
                &account_id("333333333333"),
                &AwsRegion::new("us-east-1"),
                "LZ-baseline",
            )
            .unwrap();
        assert_eq!(Some(stack.stack_id), report.succeeded[0].stack_id);
    }

    #[tokio::test]
    async fn test_should_warn_and_continue_past_unknown_accounts() {
        let harness = Harness::new();
        let report = harness
            .orchestrator
            .deploy(&baseline(OwnershipRule::AccountSet(vec![
                "dev".to_owned(),
                "sandbox".to_owned(),
            ])))
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].account_key.as_deref(), Some("sandbox"));
    }

    #[tokio::test]
    async fn test_should_fail_rolled_back_stack() {
        let harness = Harness::new();
        harness.provider.set_roll_back(true);

        let report = harness
            .orchestrator
            .deploy(&baseline(OwnershipRule::SingleAccount("dev".to_owned())))
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].kind, ErrorKind::StackOperationFailed);
    }

    #[tokio::test]
    async fn test_should_reapply_update_after_rollback() {
        let harness = Harness::new();
        let env = |value: &str| {
            Deployment::builder()
                .rule(OwnershipRule::SingleAccount("dev".to_owned()))
                .stack_name("LZ-baseline")
                .template(TemplateRef::Inline(BASELINE.to_owned()))
                .parameters(BTreeMap::from([("Env".to_owned(), value.to_owned())]))
                .build()
        };

        let created = harness.orchestrator.deploy(&env("a")).await.unwrap();
        assert_eq!(created.succeeded[0].outcome, UpsertOutcome::Created);

        harness.provider.set_roll_back(true);
        let rolled_back = harness.orchestrator.deploy(&env("b")).await.unwrap();
        assert_eq!(rolled_back.failed.len(), 1);
        assert_eq!(rolled_back.failed[0].kind, ErrorKind::StackOperationFailed);

        harness.provider.set_roll_back(false);
        let retried = harness.orchestrator.deploy(&env("b")).await.unwrap();
        assert!(retried.is_success());
        assert_eq!(retried.succeeded[0].outcome, UpsertOutcome::Updated);
        assert_eq!(harness.provider.updates(), 2);
    }
}
