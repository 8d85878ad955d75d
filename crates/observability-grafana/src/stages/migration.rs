//! Removal of the pre-rename community install.
//!
//! Older releases subscribed to the grafana operator from the shared
//! community catalog. Before the managed catalog can take over, that
//! subscription and its installed-version record have to go. Record deletion
//! completes asynchronously, so the stage yields InProgress after issuing it
//! and finishes on a later invocation.

use async_trait::async_trait;
use kube::ResourceExt;
use tracing::{debug, info};

use observability_common::Error;

use super::{Stage, StageOutcome};
use crate::model::{is_grafana_csv, is_legacy_subscription, TenantDescriptor};
use crate::reconciler::Context;

/// Detects and removes a legacy grafana subscription
pub struct MigrationStage;

#[async_trait]
impl Stage for MigrationStage {
    fn name(&self) -> &'static str {
        "migration"
    }

    async fn run(&self, ctx: &Context, tenant: &TenantDescriptor) -> StageOutcome {
        migrate(ctx, tenant).await
    }
}

/// Remove the legacy subscription and its ClusterServiceVersion, if present.
///
/// Re-checks on every call. Once no legacy subscription is listed this is a
/// single list and returns Success.
pub async fn migrate(ctx: &Context, tenant: &TenantDescriptor) -> StageOutcome {
    remove_legacy_install(ctx, tenant).await.into()
}

async fn remove_legacy_install(
    ctx: &Context,
    tenant: &TenantDescriptor,
) -> Result<StageOutcome, Error> {
    let namespace = tenant.namespace.as_str();

    let legacy: Vec<_> = ctx
        .kube
        .list_subscriptions(namespace)
        .await?
        .into_iter()
        .filter(is_legacy_subscription)
        .collect();

    if legacy.is_empty() {
        debug!(namespace = %namespace, "no legacy grafana subscription");
        return Ok(StageOutcome::Success);
    }

    for sub in &legacy {
        let name = sub.name_any();
        match ctx.kube.delete_subscription(namespace, &name).await {
            Ok(()) => info!(namespace = %namespace, name = %name, "removed legacy grafana subscription"),
            Err(e) if e.is_not_found() => {
                debug!(namespace = %namespace, name = %name, "legacy subscription already gone")
            }
            Err(e) => return Err(e),
        }
    }

    let csvs = ctx.kube.list_cluster_service_versions(namespace).await?;
    let Some(csv) = csvs.iter().find(|csv| is_grafana_csv(&csv.name_any())) else {
        debug!(namespace = %namespace, "no legacy grafana operator version record");
        return Ok(StageOutcome::Success);
    };

    let csv_name = csv.name_any();
    match ctx
        .kube
        .delete_cluster_service_version(namespace, &csv_name)
        .await
    {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }
    info!(
        namespace = %namespace,
        name = %csv_name,
        "deleting legacy grafana operator version record, waiting for removal"
    );
    Ok(StageOutcome::InProgress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use observability_common::crd::{ClusterServiceVersion, Subscription, SubscriptionSpec};

    use crate::client::MockGrafanaKubeClient;
    use crate::model::{
        GRAFANA_CATALOG_SOURCE_NAME, GRAFANA_SUBSCRIPTION_NAME, LEGACY_CATALOG_NAMESPACE,
        LEGACY_CATALOG_SOURCE,
    };

    fn tenant() -> TenantDescriptor {
        TenantDescriptor::new("tenant-a", "v4.2.0")
    }

    fn subscription(name: &str, source_namespace: &str, source: &str) -> Subscription {
        let mut sub = Subscription::new(
            name,
            SubscriptionSpec {
                catalog_source: source.to_string(),
                catalog_source_namespace: source_namespace.to_string(),
                package: "grafana-operator".to_string(),
                ..Default::default()
            },
        );
        sub.metadata.namespace = Some("tenant-a".to_string());
        sub
    }

    fn legacy_subscription() -> Subscription {
        subscription(
            GRAFANA_SUBSCRIPTION_NAME,
            LEGACY_CATALOG_NAMESPACE,
            LEGACY_CATALOG_SOURCE,
        )
    }

    fn csv(name: &str) -> ClusterServiceVersion {
        ClusterServiceVersion::new(name, Default::default())
    }

    async fn run(mock: MockGrafanaKubeClient) -> StageOutcome {
        let ctx = Context::for_testing(Arc::new(mock));
        migrate(&ctx, &tenant()).await
    }

    /// Story: after the first migration (or on a fresh tenant) the stage
    /// only lists subscriptions and moves on.
    #[tokio::test]
    async fn story_no_legacy_subscription_is_a_noop() {
        let mut mock = MockGrafanaKubeClient::new();
        mock.expect_list_subscriptions()
            .withf(|ns| ns == "tenant-a")
            .times(1)
            .returning(|_| {
                Ok(vec![subscription(
                    GRAFANA_SUBSCRIPTION_NAME,
                    "tenant-a",
                    GRAFANA_CATALOG_SOURCE_NAME,
                )])
            });
        mock.expect_delete_subscription().never();
        mock.expect_list_cluster_service_versions().never();

        assert!(run(mock).await.is_success());
    }

    /// Story: a community install is found with its version record still
    /// present; both are deleted and the stage waits for the record to go.
    #[tokio::test]
    async fn story_legacy_install_is_removed_and_waits() {
        let mut mock = MockGrafanaKubeClient::new();
        mock.expect_list_subscriptions()
            .returning(|_| Ok(vec![legacy_subscription()]));
        mock.expect_delete_subscription()
            .withf(|ns, name| ns == "tenant-a" && name == GRAFANA_SUBSCRIPTION_NAME)
            .times(1)
            .returning(|_, _| Ok(()));
        mock.expect_list_cluster_service_versions().returning(|_| {
            Ok(vec![
                csv("prometheus-operator.v0.45.0"),
                csv("grafana-operator.v3.10.3"),
            ])
        });
        mock.expect_delete_cluster_service_version()
            .withf(|ns, name| ns == "tenant-a" && name == "grafana-operator.v3.10.3")
            .times(1)
            .returning(|_, _| Ok(()));

        assert!(matches!(run(mock).await, StageOutcome::InProgress));
    }

    /// Story: the legacy subscription is deleted but no version record
    /// remains, so migration completes in one call.
    #[tokio::test]
    async fn story_legacy_subscription_without_record_completes() {
        let mut mock = MockGrafanaKubeClient::new();
        mock.expect_list_subscriptions()
            .returning(|_| Ok(vec![legacy_subscription()]));
        mock.expect_delete_subscription().returning(|_, _| Ok(()));
        mock.expect_list_cluster_service_versions()
            .returning(|_| Ok(vec![csv("prometheus-operator.v0.45.0")]));
        mock.expect_delete_cluster_service_version().never();

        assert!(run(mock).await.is_success());
    }

    #[tokio::test]
    async fn subscription_from_other_catalog_is_left_alone() {
        let mut mock = MockGrafanaKubeClient::new();
        mock.expect_list_subscriptions().returning(|_| {
            Ok(vec![subscription(
                GRAFANA_SUBSCRIPTION_NAME,
                LEGACY_CATALOG_NAMESPACE,
                "redhat-operators",
            )])
        });
        mock.expect_delete_subscription().never();

        assert!(run(mock).await.is_success());
    }

    #[tokio::test]
    async fn subscription_already_deleted_is_tolerated() {
        let mut mock = MockGrafanaKubeClient::new();
        mock.expect_list_subscriptions()
            .returning(|_| Ok(vec![legacy_subscription()]));
        mock.expect_delete_subscription().returning(|ns, name| {
            Err(Error::not_found("Subscription", ns, name))
        });
        mock.expect_list_cluster_service_versions()
            .returning(|_| Ok(vec![]));

        assert!(run(mock).await.is_success());
    }

    #[tokio::test]
    async fn subscription_delete_failure_fails_the_stage() {
        let mut mock = MockGrafanaKubeClient::new();
        mock.expect_list_subscriptions()
            .returning(|_| Ok(vec![legacy_subscription()]));
        mock.expect_delete_subscription()
            .returning(|_, _| Err(Error::internal_with_context("store", "connection reset")));
        mock.expect_list_cluster_service_versions().never();

        let outcome = run(mock).await;
        assert!(outcome
            .error()
            .is_some_and(|e| e.to_string().contains("connection reset")));
    }

    #[tokio::test]
    async fn list_failure_fails_the_stage() {
        let mut mock = MockGrafanaKubeClient::new();
        mock.expect_list_subscriptions()
            .returning(|_| Err(Error::internal_with_context("store", "timeout")));

        assert!(matches!(run(mock).await, StageOutcome::Failed(_)));
    }
}
