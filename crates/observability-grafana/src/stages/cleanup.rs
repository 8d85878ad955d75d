//! Teardown of the grafana operator installation.
//!
//! Runs when the Observability resource is being deleted. Every delete is
//! idempotent: an object that is already gone counts as removed.

use async_trait::async_trait;
use kube::ResourceExt;
use tracing::{debug, info};

use observability_common::Error;

use super::{Stage, StageOutcome};
use crate::model::{
    TenantDescriptor, GRAFANA_CATALOG_SOURCE_NAME, GRAFANA_OPERATOR_DEPLOYMENT,
    GRAFANA_SUBSCRIPTION_NAME, OPERATOR_GROUP_NAME,
};
use crate::reconciler::Context;

/// Deletes every managed object and the grafana operator deployment
pub struct CleanupStage;

#[async_trait]
impl Stage for CleanupStage {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    async fn run(&self, ctx: &Context, tenant: &TenantDescriptor) -> StageOutcome {
        cleanup(ctx, tenant).await
    }
}

/// Delete the CatalogSource, Subscription and OperatorGroup, then the
/// operator deployment.
///
/// The deployment is matched by exact name, unlike readiness which accepts
/// any `grafana-operator` prefix.
pub async fn cleanup(ctx: &Context, tenant: &TenantDescriptor) -> StageOutcome {
    teardown(ctx, tenant).await.into()
}

async fn teardown(ctx: &Context, tenant: &TenantDescriptor) -> Result<StageOutcome, Error> {
    let namespace = tenant.namespace.as_str();

    tolerate_absent(
        "CatalogSource",
        namespace,
        GRAFANA_CATALOG_SOURCE_NAME,
        ctx.kube
            .delete_catalog_source(namespace, GRAFANA_CATALOG_SOURCE_NAME)
            .await,
    )?;
    tolerate_absent(
        "Subscription",
        namespace,
        GRAFANA_SUBSCRIPTION_NAME,
        ctx.kube
            .delete_subscription(namespace, GRAFANA_SUBSCRIPTION_NAME)
            .await,
    )?;
    tolerate_absent(
        "OperatorGroup",
        namespace,
        OPERATOR_GROUP_NAME,
        ctx.kube
            .delete_operator_group(namespace, OPERATOR_GROUP_NAME)
            .await,
    )?;

    for deployment in ctx.kube.list_deployments(namespace).await? {
        let name = deployment.name_any();
        if name != GRAFANA_OPERATOR_DEPLOYMENT {
            continue;
        }
        tolerate_absent(
            "Deployment",
            namespace,
            &name,
            ctx.kube.delete_deployment(namespace, &name).await,
        )?;
    }

    info!(namespace = %namespace, "grafana operator installation removed");
    Ok(StageOutcome::Success)
}

fn tolerate_absent(
    kind: &str,
    namespace: &str,
    name: &str,
    result: Result<(), Error>,
) -> Result<(), Error> {
    match result {
        Ok(()) => {
            debug!(kind, namespace = %namespace, name = %name, "deleted");
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            debug!(kind, namespace = %namespace, name = %name, "already absent");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
