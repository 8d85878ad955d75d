//! Grafana operator readiness gate.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;
use tracing::debug;

use observability_common::Error;

use super::{Stage, StageOutcome};
use crate::model::{TenantDescriptor, GRAFANA_OPERATOR_DEPLOYMENT};
use crate::reconciler::Context;

/// Waits for the OLM-created grafana operator deployment to become ready
pub struct ReadinessStage;

#[async_trait]
impl Stage for ReadinessStage {
    fn name(&self) -> &'static str {
        "readiness"
    }

    async fn run(&self, ctx: &Context, tenant: &TenantDescriptor) -> StageOutcome {
        check(ctx, tenant).await
    }
}

/// Success once a deployment named `grafana-operator*` has a ready replica.
///
/// A missing deployment is InProgress, not Failed: OLM materializes it some
/// time after the subscription resolves. The name is prefix-matched because
/// OLM owns it; cleanup deletes by exact name.
pub async fn check(ctx: &Context, tenant: &TenantDescriptor) -> StageOutcome {
    find_ready_deployment(ctx, tenant).await.into()
}

async fn find_ready_deployment(
    ctx: &Context,
    tenant: &TenantDescriptor,
) -> Result<StageOutcome, Error> {
    let deployments = ctx.kube.list_deployments(&tenant.namespace).await?;

    match deployments.iter().find(|d| is_ready_grafana_operator(d)) {
        Some(deployment) => {
            debug!(
                namespace = %tenant.namespace,
                name = %deployment.name_any(),
                "grafana operator ready"
            );
            Ok(StageOutcome::Success)
        }
        None => {
            debug!(
                namespace = %tenant.namespace,
                candidates = deployments
                    .iter()
                    .filter(|d| d.name_any().starts_with(GRAFANA_OPERATOR_DEPLOYMENT))
                    .count(),
                "waiting for grafana operator deployment"
            );
            Ok(StageOutcome::InProgress)
        }
    }
}

fn is_ready_grafana_operator(deployment: &Deployment) -> bool {
    deployment.name_any().starts_with(GRAFANA_OPERATOR_DEPLOYMENT)
        && ready_replicas(deployment) > 0
}

fn ready_replicas(deployment: &Deployment) -> i32 {
    deployment
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use k8s_openapi::api::apps::v1::DeploymentStatus;
    use kube::api::ObjectMeta;

    use crate::client::MockGrafanaKubeClient;

    fn deployment(name: &str, ready: Option<i32>) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("tenant-a".to_string()),
                ..Default::default()
            },
            status: Some(DeploymentStatus {
                ready_replicas: ready,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    async fn check_with(deployments: Vec<Deployment>) -> StageOutcome {
        let mut mock = MockGrafanaKubeClient::new();
        mock.expect_list_deployments()
            .withf(|ns| ns == "tenant-a")
            .returning(move |_| Ok(deployments.clone()));
        let ctx = Context::for_testing(Arc::new(mock));
        check(&ctx, &TenantDescriptor::new("tenant-a", "v4.2.0")).await
    }

    #[tokio::test]
    async fn story_readiness_follows_the_deployment() {
        // Subscription just created, OLM has not produced a deployment yet
        assert!(matches!(check_with(vec![]).await, StageOutcome::InProgress));

        // Deployment exists but the pod is still starting
        assert!(matches!(
            check_with(vec![deployment("grafana-operator", Some(0))]).await,
            StageOutcome::InProgress
        ));

        assert!(check_with(vec![deployment("grafana-operator", Some(1))])
            .await
            .is_success());
    }

    #[tokio::test]
    async fn suffixed_deployment_name_counts() {
        assert!(
            check_with(vec![deployment("grafana-operator-controller-manager", Some(1))])
                .await
                .is_success()
        );
    }

    #[tokio::test]
    async fn unrelated_ready_deployments_do_not_count() {
        let outcome = check_with(vec![
            deployment("prometheus-operator", Some(2)),
            deployment("grafana-operator", None),
        ])
        .await;
        assert!(matches!(outcome, StageOutcome::InProgress));
    }

    #[test]
    fn missing_status_means_zero_ready() {
        let mut d = deployment("grafana-operator", Some(3));
        d.status = None;
        assert_eq!(ready_replicas(&d), 0);
        assert!(!is_ready_grafana_operator(&d));
    }

    #[tokio::test]
    async fn list_failure_fails_the_stage() {
        let mut mock = MockGrafanaKubeClient::new();
        mock.expect_list_deployments()
            .returning(|_| Err(Error::internal_with_context("store", "timeout")));
        let ctx = Context::for_testing(Arc::new(mock));

        let outcome = check(&ctx, &TenantDescriptor::new("tenant-a", "v4.2.0")).await;
        assert!(matches!(outcome, StageOutcome::Failed(_)));
    }
}
