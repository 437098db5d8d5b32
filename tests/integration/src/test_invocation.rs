//! The invocation entry point, from request JSON to batch report.

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use lzstack_core::{
        FileTemplateStore, InMemoryStackProvider, InvocationContext, StaticTrustProvider,
        handle_invocation,
    };
    use lzstack_model::{ErrorKind, InvocationRequest, Target, UpsertOutcome};
    use serde_json::json;
    use tempfile::TempDir;

    use crate::{fast_config, init_tracing};

    struct Fixture {
        dir: TempDir,
        provider: Arc<InMemoryStackProvider>,
        trust: Arc<StaticTrustProvider>,
        context: InvocationContext,
    }

    impl Fixture {
        fn new() -> Self {
            init_tracing();
            let dir = tempfile::tempdir().unwrap();
            let accounts = json!([
                { "key": "ops", "id": "111111111111", "ou": "core" },
                { "key": "shared", "id": "222222222222", "ou": "core" },
                { "key": "dev", "id": "333333333333", "ou": "workloads" },
                { "key": "prod", "id": "444444444444", "ou": "workloads" },
            ]);
            std::fs::write(dir.path().join("accounts.json"), accounts.to_string()).unwrap();
            std::fs::write(
                dir.path().join("baseline.json"),
                r#"{"Resources":{},"Outputs":{"Env":{"Value":"lz"}}}"#,
            )
            .unwrap();

            let provider = Arc::new(InMemoryStackProvider::new());
            let trust = Arc::new(StaticTrustProvider::new());
            let context = InvocationContext {
                config: fast_config(),
                trust: Arc::clone(&trust) as _,
                templates: Arc::new(FileTemplateStore::with_base_dir(dir.path())),
                provider: Arc::clone(&provider) as _,
            };
            Self {
                dir,
                provider,
                trust,
                context,
            }
        }

        fn request(&self, extra: serde_json::Value) -> InvocationRequest {
            let mut request = json!({
                "stackName": "LZ-baseline",
                "stackTemplate": { "type": "file", "path": "baseline.json" },
                "accountsSource": accounts_path(self.dir.path()),
            });
            if let (Some(base), Some(extra)) = (request.as_object_mut(), extra.as_object()) {
                base.extend(extra.clone());
            }
            serde_json::from_value(request).unwrap()
        }
    }

    fn accounts_path(dir: &Path) -> String {
        dir.join("accounts.json").display().to_string()
    }

    #[tokio::test]
    async fn test_should_deploy_to_home_account_by_default() {
        let fixture = Fixture::new();
        let request = fixture.request(json!({}));

        let report = handle_invocation(&request, &fixture.context).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.succeeded.len(), 1);
        let result = &report.succeeded[0];
        assert_eq!(result.target, Target::new("ops", "us-east-1"));
        assert_eq!(result.outcome, UpsertOutcome::Created);
        assert_eq!(result.outputs["Env"], "lz");
        assert_eq!(fixture.trust.calls(), 0);
    }

    #[tokio::test]
    async fn test_should_deploy_to_requested_account_and_region() {
        let fixture = Fixture::new();
        let request = fixture.request(json!({
            "accountId": "333333333333",
            "region": "eu-west-1",
            "stackParameters": { "Env": "dev" },
            "stackCapabilities": ["CAPABILITY_IAM"],
        }));

        let report = handle_invocation(&request, &fixture.context).await.unwrap();

        assert_eq!(report.succeeded[0].target, Target::new("dev", "eu-west-1"));
        assert_eq!(fixture.trust.calls(), 1);
        assert_eq!(fixture.provider.creates(), 1);

        let again = handle_invocation(&request, &fixture.context).await.unwrap();
        assert_eq!(again.succeeded[0].outcome, UpsertOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_should_expand_shared_ownership_and_skip_ignored_account() {
        let fixture = Fixture::new();
        let request = fixture.request(json!({
            "ownership": {
                "sharedVia": {
                    "baseAccount": "ops",
                    "vpcShare": { "shareToOuAccounts": true, "shareToSpecificAccounts": ["dev"] },
                },
            },
            "regions": ["us-east-1", "eu-west-1"],
            "ignoreAccountId": "222222222222",
            "ignoreRegion": "eu-west-1",
        }));

        let report = handle_invocation(&request, &fixture.context).await.unwrap();

        assert!(report.is_success());
        let outcomes: Vec<_> = report
            .succeeded
            .iter()
            .map(|r| (r.target.to_string(), r.outcome))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                ("dev/eu-west-1".to_owned(), UpsertOutcome::Created),
                ("dev/us-east-1".to_owned(), UpsertOutcome::Created),
                ("ops/eu-west-1".to_owned(), UpsertOutcome::Created),
                ("ops/us-east-1".to_owned(), UpsertOutcome::Created),
                ("shared/eu-west-1".to_owned(), UpsertOutcome::Skipped),
                ("shared/us-east-1".to_owned(), UpsertOutcome::Created),
            ]
        );
        assert_eq!(fixture.provider.creates(), 5);
    }

    #[tokio::test]
    async fn test_should_fail_run_when_directory_cannot_load() {
        let fixture = Fixture::new();
        let mut request = fixture.request(json!({}));
        request.accounts_source = fixture.dir.path().join("missing.json");

        let err = handle_invocation(&request, &fixture.context)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::DirectoryLoad);
        assert!(err.kind.is_run_fatal());
        assert_eq!(fixture.provider.describes(), 0);
    }

    #[tokio::test]
    async fn test_should_reject_account_id_missing_from_directory() {
        let fixture = Fixture::new();
        let request = fixture.request(json!({ "accountId": "999999999999" }));

        let err = handle_invocation(&request, &fixture.context)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownAccount);
    }

    #[tokio::test]
    async fn test_should_fail_run_when_template_is_missing() {
        let fixture = Fixture::new();
        let request = fixture.request(json!({
            "stackTemplate": { "type": "file", "path": "absent.json" },
        }));

        let err = handle_invocation(&request, &fixture.context)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::TemplateNotFound);
        assert!(err.kind.is_run_fatal());
        assert_eq!(fixture.provider.describes(), 0);
    }
}
