//! Subscription convergence.

use async_trait::async_trait;
use tracing::debug;

use observability_common::Error;

use super::{Stage, StageOutcome};
use crate::model::{self, TenantDescriptor};
use crate::reconciler::Context;

/// Creates or overwrites the grafana operator Subscription
pub struct SubscriptionStage;

#[async_trait]
impl Stage for SubscriptionStage {
    fn name(&self) -> &'static str {
        "subscription"
    }

    async fn run(&self, ctx: &Context, tenant: &TenantDescriptor) -> StageOutcome {
        reconcile(ctx, tenant).await
    }
}

/// Converge the Subscription to the managed catalog source.
///
/// `startingCSV` pins the exact tenant version instead of the channel head,
/// and the resource config is overwritten along with the rest of `.spec`.
pub async fn reconcile(ctx: &Context, tenant: &TenantDescriptor) -> StageOutcome {
    apply(ctx, tenant).await.into()
}

async fn apply(ctx: &Context, tenant: &TenantDescriptor) -> Result<StageOutcome, Error> {
    let desired = model::subscription(tenant);
    let result = ctx.kube.apply_subscription(&desired).await?;
    debug!(
        namespace = %tenant.namespace,
        starting_csv = ?desired.spec.starting_csv,
        %result,
        "subscription reconciled"
    );
    Ok(StageOutcome::Success)
}
