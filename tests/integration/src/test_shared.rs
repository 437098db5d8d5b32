//! Shared-resource allocation under concurrency.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::join_all;
    use lzstack_core::{OwnershipRule, SharedKeyAllocator, SharedResource};
    use lzstack_model::{LzError, ResourceRef, Target, TemplateRef};

    use crate::{Harness, account_id};

    const KMS_TEMPLATE: &str =
        r#"{"Resources":{"Key":{}},"Outputs":{"KeyArn":{"Value":"arn:aws:kms:key/ebs"}}}"#;

    fn ebs_key(rule: OwnershipRule) -> SharedResource {
        SharedResource::builder()
            .kind("ebs-default-key")
            .rule(rule)
            .stack_name("LZ-ebs-key")
            .template(TemplateRef::Inline(KMS_TEMPLATE.to_owned()))
            .physical_id_output("KeyArn")
            .build()
    }

    #[tokio::test]
    async fn test_should_allocate_once_for_racing_requesters() {
        let allocator = Arc::new(SharedKeyAllocator::new());
        let target = Target::new("dev", "us-east-1");
        let provisioned = Arc::new(AtomicUsize::new(0));

        let handles = (0..2).map(|_| {
            let allocator = Arc::clone(&allocator);
            let target = target.clone();
            let provisioned = Arc::clone(&provisioned);
            tokio::spawn(async move {
                allocator
                    .ensure(&target, "ebs-default-key", || async {
                        let n = provisioned.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok::<_, LzError>(ResourceRef {
                            kind: "ebs-default-key".to_owned(),
                            target: target.clone(),
                            physical_id: format!("key-{n}"),
                        })
                    })
                    .await
            })
        });
        let refs: Vec<ResourceRef> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(provisioned.load(Ordering::SeqCst), 1);
        assert_eq!(allocator.allocations(), 1);
        assert_eq!(refs[0], refs[1]);
    }

    #[tokio::test]
    async fn test_should_provision_shared_resource_once_per_target_across_rules() {
        let harness = Harness::new();
        let orchestrator = &harness.orchestrator;
        let workloads = ebs_key(OwnershipRule::AccountSet(vec![
            "dev".to_owned(),
            "prod".to_owned(),
        ]));
        let dev_only = ebs_key(OwnershipRule::SingleAccount("dev".to_owned()));

        let (first, second) = tokio::join!(
            orchestrator.ensure_shared(&workloads),
            orchestrator.ensure_shared(&dev_only),
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert!(first.is_success());
        assert!(second.is_success());

        assert_eq!(harness.provider.creates(), 2);
        assert_eq!(orchestrator.allocator().allocations(), 2);

        let dev = Target::new("dev", "us-east-1");
        let from_first = first.succeeded.iter().find(|r| r.target == dev).unwrap();
        assert_eq!(from_first, &second.succeeded[0]);
        assert_eq!(from_first.physical_id, "arn:aws:kms:key/ebs");
    }

    #[tokio::test]
    async fn test_should_reuse_recorded_resource_on_later_runs() {
        let harness = Harness::new();
        let orchestrator = &harness.orchestrator;
        let resource = ebs_key(OwnershipRule::SingleAccount("prod".to_owned()));

        let first = orchestrator.ensure_shared(&resource).await.unwrap();
        let describes = harness.provider.describes();
        let again = orchestrator.ensure_shared(&resource).await.unwrap();

        assert_eq!(first.succeeded, again.succeeded);
        assert_eq!(harness.provider.creates(), 1);
        assert_eq!(harness.provider.describes(), describes);
    }

    #[tokio::test]
    async fn test_should_not_record_failed_provisioning() {
        let harness = Harness::new();
        let orchestrator = &harness.orchestrator;
        let resource = ebs_key(OwnershipRule::SingleAccount("shared".to_owned()));
        harness.trust.deny(account_id("222222222222"));

        let failed = orchestrator.ensure_shared(&resource).await.unwrap();
        assert_eq!(failed.failed.len(), 1);
        assert!(!failed.is_retry_safe());
        assert!(orchestrator.allocator().is_empty());
        assert_eq!(harness.provider.creates(), 0);
    }
}
