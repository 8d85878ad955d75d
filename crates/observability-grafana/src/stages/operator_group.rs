//! OperatorGroup convergence.
//!
//! OLM refuses to install into a namespace holding more than one
//! OperatorGroup, so this stage reads before it writes: any existing group,
//! whatever its name, satisfies the stage and is left untouched.

use async_trait::async_trait;
use kube::ResourceExt;
use tracing::{debug, info};

use observability_common::Error;

use super::{Stage, StageOutcome};
use crate::model::{self, TenantDescriptor};
use crate::reconciler::Context;

/// Ensures the tenant namespace has exactly one OperatorGroup
pub struct OperatorGroupStage;

#[async_trait]
impl Stage for OperatorGroupStage {
    fn name(&self) -> &'static str {
        "operator-group"
    }

    async fn run(&self, ctx: &Context, tenant: &TenantDescriptor) -> StageOutcome {
        reconcile(ctx, tenant).await
    }
}

/// Create the OperatorGroup unless the namespace already has one.
pub async fn reconcile(ctx: &Context, tenant: &TenantDescriptor) -> StageOutcome {
    ensure_operator_group(ctx, tenant).await.into()
}

async fn ensure_operator_group(
    ctx: &Context,
    tenant: &TenantDescriptor,
) -> Result<StageOutcome, Error> {
    let namespace = tenant.namespace.as_str();

    let existing = ctx.kube.list_operator_groups(namespace).await?;
    if let Some(group) = existing.first() {
        debug!(
            namespace = %namespace,
            name = %group.name_any(),
            count = existing.len(),
            "operator group already present"
        );
        return Ok(StageOutcome::Success);
    }

    let result = ctx
        .kube
        .apply_operator_group(&model::operator_group(tenant))
        .await?;
    info!(namespace = %namespace, %result, "operator group reconciled");
    Ok(StageOutcome::Success)
}
