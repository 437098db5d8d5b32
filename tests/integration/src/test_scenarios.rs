//! Resolution and lifecycle walkthroughs over the fixture landing zone.

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use lzstack_core::{Deployment, OwnershipRule, ou_member_keys};
    use lzstack_model::{
        Account, AwsRegion, Exclusion, StackState, Target, TemplateRef, UpsertOutcome,
        UpsertRequest,
    };

    use crate::{Harness, account_id};

    const BASELINE: &str = r#"{"Resources":{}}"#;

    fn ou_members(accounts: &[Account], ou: &str) -> Vec<String> {
        ou_member_keys(accounts, ou)
    }

    #[tokio::test]
    async fn test_should_expand_shared_via_to_base_and_consumers() {
        let harness = Harness::new();
        let rule = OwnershipRule::shared_via("ops", ou_members);

        let targets = harness
            .orchestrator
            .resolver()
            .resolve(&rule, &[], None)
            .unwrap();
        assert_eq!(
            targets.into_iter().collect::<Vec<_>>(),
            vec![
                Target::new("ops", "us-east-1"),
                Target::new("shared", "us-east-1"),
            ]
        );

        let report = harness
            .orchestrator
            .deploy(
                &Deployment::builder()
                    .rule(rule)
                    .stack_name("LZ-network")
                    .template(TemplateRef::Inline(BASELINE.to_owned()))
                    .build(),
            )
            .await
            .unwrap();
        assert!(report.is_success());
        assert_eq!(report.succeeded.len(), 2);
        assert!(
            report
                .succeeded
                .iter()
                .all(|r| r.outcome == UpsertOutcome::Created)
        );
        assert_eq!(harness.provider.creates(), 2);
    }

    #[tokio::test]
    async fn test_should_not_duplicate_targets_for_overlapping_consumers() {
        let harness = Harness::new();
        let rule = OwnershipRule::shared_via("dev", |accounts: &[Account], ou: &str| {
            let mut keys = ou_members(accounts, ou);
            keys.extend(["dev".to_owned(), "prod".to_owned(), "prod".to_owned()]);
            keys
        });
        let regions = [AwsRegion::new("us-east-1"), AwsRegion::new("eu-west-1")];

        let targets = harness
            .orchestrator
            .resolver()
            .resolve(&rule, &regions, None)
            .unwrap();
        let unique: BTreeSet<_> = targets.iter().cloned().collect();
        assert_eq!(targets.len(), 4);
        assert_eq!(unique.len(), targets.len());
    }

    #[tokio::test]
    async fn test_should_skip_excluded_account_in_every_region() {
        let harness = Harness::new();
        let exclusion = Exclusion::account(account_id("222222222222"));

        let report = harness
            .orchestrator
            .deploy(
                &Deployment::builder()
                    .rule(OwnershipRule::AccountSet(vec![
                        "shared".to_owned(),
                        "dev".to_owned(),
                    ]))
                    .regions(vec![
                        AwsRegion::new("us-east-1"),
                        AwsRegion::new("eu-west-1"),
                    ])
                    .stack_name("LZ-baseline")
                    .template(TemplateRef::Inline(BASELINE.to_owned()))
                    .exclusion(exclusion)
                    .build(),
            )
            .await
            .unwrap();

        assert!(report.is_success());
        let skipped: Vec<_> = report
            .succeeded
            .iter()
            .filter(|r| r.outcome == UpsertOutcome::Skipped)
            .map(|r| r.target.clone())
            .collect();
        assert_eq!(
            skipped,
            vec![
                Target::new("shared", "eu-west-1"),
                Target::new("shared", "us-east-1"),
            ]
        );
        // only dev's two regions reach the providers
        assert_eq!(harness.provider.creates(), 2);
        assert_eq!(harness.trust.calls(), 2);
        assert!(
            harness
                .provider
                .stack(
                    &account_id("222222222222"),
                    &AwsRegion::new("us-east-1"),
                    "LZ-baseline"
                )
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_should_not_touch_providers_for_excluded_request() {
        let harness = Harness::new();
        let request = UpsertRequest::new(
            Target::new("shared", "eu-west-1"),
            "LZ-baseline",
            TemplateRef::Inline(BASELINE.to_owned()),
        )
        .with_exclusion(Exclusion::account(account_id("222222222222")));

        let result = harness.orchestrator.engine().upsert(&request).await.unwrap();
        assert_eq!(result.outcome, UpsertOutcome::Skipped);
        assert_eq!(result.stack_id, None);
        assert_eq!(harness.provider.describes(), 0);
        assert_eq!(harness.trust.calls(), 0);
    }

    #[tokio::test]
    async fn test_should_walk_created_updated_unchanged() {
        let harness = Harness::new();
        let engine = harness.orchestrator.engine();
        let target = Target::new("dev", "us-east-1");
        let v1 = UpsertRequest::new(
            target.clone(),
            "LZ-kms",
            TemplateRef::Inline(r#"{"Resources":{"Key":{}}}"#.to_owned()),
        );
        let v2 = v1.clone().with_parameter("Alias", "alias/lz-ebs");

        let created = engine.upsert(&v1).await.unwrap();
        assert_eq!(created.outcome, UpsertOutcome::Created);

        let updated = engine.upsert(&v2).await.unwrap();
        assert_eq!(updated.outcome, UpsertOutcome::Updated);
        assert_eq!(updated.stack_id, created.stack_id);

        let unchanged = engine.upsert(&v2).await.unwrap();
        assert_eq!(unchanged.outcome, UpsertOutcome::Unchanged);
        assert_eq!(unchanged.stack_id, created.stack_id);

        assert_eq!(harness.provider.creates(), 1);
        assert_eq!(harness.provider.updates(), 2);

        let handle = harness.orchestrator.registry().try_get(&target).unwrap();
        assert_eq!(handle.state(), StackState::Created);
        assert_eq!(handle.stack_id(), created.stack_id);
    }

    #[tokio::test]
    async fn test_should_resolve_all_accounts_in_order() {
        let harness = Harness::new();
        let report = harness
            .orchestrator
            .deploy(
                &Deployment::builder()
                    .rule(OwnershipRule::AllAccounts)
                    .stack_name("LZ-baseline")
                    .template(TemplateRef::Inline(BASELINE.to_owned()))
                    .build(),
            )
            .await
            .unwrap();

        let keys: Vec<_> = report
            .succeeded
            .iter()
            .map(|r| r.target.account_key.as_str())
            .collect();
        assert_eq!(keys, vec!["dev", "ops", "prod", "shared"]);
        // the home account deploys with the ambient identity
        assert_eq!(harness.trust.calls(), 3);
    }
}
