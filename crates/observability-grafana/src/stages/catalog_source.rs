//! CatalogSource convergence.

use async_trait::async_trait;
use tracing::debug;

use observability_common::Error;

use super::{Stage, StageOutcome};
use crate::model::{self, TenantDescriptor};
use crate::reconciler::Context;

/// Creates or overwrites the grafana operator CatalogSource
pub struct CatalogSourceStage;

#[async_trait]
impl Stage for CatalogSourceStage {
    fn name(&self) -> &'static str {
        "catalog-source"
    }

    async fn run(&self, ctx: &Context, tenant: &TenantDescriptor) -> StageOutcome {
        reconcile(ctx, tenant).await
    }
}

/// Converge the CatalogSource to the tenant's version.
///
/// `.spec` is overwritten wholesale so an index image from an older
/// version never survives an upgrade.
pub async fn reconcile(ctx: &Context, tenant: &TenantDescriptor) -> StageOutcome {
    apply(ctx, tenant).await.into()
}

async fn apply(ctx: &Context, tenant: &TenantDescriptor) -> Result<StageOutcome, Error> {
    let desired = model::catalog_source(tenant, &ctx.config);
    let result = ctx.kube.apply_catalog_source(&desired).await?;
    debug!(
        namespace = %tenant.namespace,
        image = ?desired.spec.image,
        %result,
        "catalog source reconciled"
    );
    Ok(StageOutcome::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use observability_common::crd::{CatalogSource, SourceType};
    use observability_common::ApplyResult;

    use crate::client::MockGrafanaKubeClient;
    use crate::model::{InstallConfig, GRAFANA_CATALOG_SOURCE_NAME};

    /// Records what the stage asked the store to apply.
    fn capturing_mock(applied: Arc<Mutex<Vec<CatalogSource>>>) -> MockGrafanaKubeClient {
        let mut mock = MockGrafanaKubeClient::new();
        mock.expect_apply_catalog_source().returning(move |desired| {
            applied
                .lock()
                .expect("mutex should not be poisoned")
                .push(desired.clone());
            Ok(ApplyResult::Created)
        });
        mock
    }

    #[tokio::test]
    async fn story_catalog_source_points_at_versioned_index() {
        let applied = Arc::new(Mutex::new(Vec::new()));
        let ctx = Context::for_testing(Arc::new(capturing_mock(applied.clone())));

        let outcome = reconcile(&ctx, &TenantDescriptor::new("tenant-a", "v4.2.0")).await;
        assert!(outcome.is_success());

        let applied = applied.lock().expect("mutex should not be poisoned");
        let source = applied.first().expect("catalog source applied");
        assert_eq!(source.metadata.name.as_deref(), Some(GRAFANA_CATALOG_SOURCE_NAME));
        assert_eq!(source.metadata.namespace.as_deref(), Some("tenant-a"));
        assert_eq!(source.spec.source_type, SourceType::Grpc);
        assert_eq!(
            source.spec.image.as_deref(),
            Some("quay.io/rhoas/grafana-operator-index:v4.2.0")
        );
    }

    #[tokio::test]
    async fn configured_registry_is_used() {
        let applied = Arc::new(Mutex::new(Vec::new()));
        let ctx = Context::for_testing(Arc::new(capturing_mock(applied.clone()))).with_config(
            InstallConfig {
                registry: "mirror.example.com/rhoas".to_string(),
                ..Default::default()
            },
        );

        reconcile(&ctx, &TenantDescriptor::new("tenant-a", "v4.2.0")).await;

        let applied = applied.lock().expect("mutex should not be poisoned");
        assert_eq!(
            applied[0].spec.image.as_deref(),
            Some("mirror.example.com/rhoas/grafana-operator-index:v4.2.0")
        );
    }

    #[tokio::test]
    async fn unchanged_source_is_still_success() {
        let mut mock = MockGrafanaKubeClient::new();
        mock.expect_apply_catalog_source()
            .times(1)
            .returning(|_| Ok(ApplyResult::Unchanged));
        let ctx = Context::for_testing(Arc::new(mock));

        assert!(reconcile(&ctx, &TenantDescriptor::new("tenant-a", "v4.2.0"))
            .await
            .is_success());
    }

    #[tokio::test]
    async fn store_error_fails_the_stage() {
        let mut mock = MockGrafanaKubeClient::new();
        mock.expect_apply_catalog_source()
            .returning(|_| Err(Error::internal_with_context("store", "apiserver unavailable")));
        let ctx = Context::for_testing(Arc::new(mock));

        let outcome = reconcile(&ctx, &TenantDescriptor::new("tenant-a", "v4.2.0")).await;
        assert!(matches!(outcome, StageOutcome::Failed(_)));
    }
}
