//! Observability controller implementation
//!
//! Bridges kube-runtime's controller to the grafana installation reconciler.
//! kube-runtime serializes reconciles per object key, which is the
//! single-writer guarantee the stages rely on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use observability_common::crd::{Observability, ObservabilityStatus, StageStatus};
use observability_common::Error;
use observability_grafana::{
    GrafanaInstallationReconciler, ObservabilityReconciler, StageOutcome, StageReport,
    TenantDescriptor,
};

/// Finalizer guarding teardown of the grafana installation
pub const OBSERVABILITY_FINALIZER: &str = "observability.redhat.com/grafana-installation";

/// Field manager used for status and finalizer patches
pub const FIELD_MANAGER: &str = "observability-controller";

/// Delay after adding the finalizer before the first real reconcile
const FINALIZER_REQUEUE: Duration = Duration::from_secs(1);

/// Operations on the Observability resource itself
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObservabilityKubeClient: Send + Sync {
    /// Replace the status subresource
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ObservabilityStatus,
    ) -> Result<(), Error>;

    /// Add a finalizer if not already present
    async fn add_finalizer(&self, namespace: &str, name: &str, finalizer: &str)
        -> Result<(), Error>;

    /// Remove a finalizer if present
    async fn remove_finalizer(
        &self,
        namespace: &str,
        name: &str,
        finalizer: &str,
    ) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct ObservabilityKubeClientImpl {
    client: Client,
}

impl ObservabilityKubeClientImpl {
    /// Create a new ObservabilityKubeClientImpl wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Observability> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn patch_finalizers(
        &self,
        namespace: &str,
        name: &str,
        finalizers: Vec<String>,
    ) -> Result<(), Error> {
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers
            }
        });
        self.api(namespace)
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ObservabilityKubeClient for ObservabilityKubeClientImpl {
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ObservabilityStatus,
    ) -> Result<(), Error> {
        let status_patch = serde_json::json!({
            "status": status
        });
        self.api(namespace)
            .patch_status(
                name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&status_patch),
            )
            .await?;
        Ok(())
    }

    async fn add_finalizer(
        &self,
        namespace: &str,
        name: &str,
        finalizer: &str,
    ) -> Result<(), Error> {
        let obs = self.api(namespace).get(name).await?;
        let mut finalizers = obs.metadata.finalizers.unwrap_or_default();
        if finalizers.iter().any(|f| f == finalizer) {
            return Ok(());
        }
        finalizers.push(finalizer.to_string());
        self.patch_finalizers(namespace, name, finalizers).await
    }

    async fn remove_finalizer(
        &self,
        namespace: &str,
        name: &str,
        finalizer: &str,
    ) -> Result<(), Error> {
        let obs = match self.api(namespace).get_opt(name).await? {
            Some(obs) => obs,
            None => return Ok(()),
        };
        let finalizers: Vec<String> = obs
            .metadata
            .finalizers
            .unwrap_or_default()
            .into_iter()
            .filter(|f| f != finalizer)
            .collect();
        self.patch_finalizers(namespace, name, finalizers).await
    }
}

/// Controller context shared across reconciles
pub struct Context {
    /// Access to Observability resources
    pub kube: Arc<dyn ObservabilityKubeClient>,
    /// Store access, install settings and cancellation for the stages
    pub stages: observability_grafana::Context,
    /// The sub-component reconciler driven for every tenant
    pub reconciler: Arc<dyn ObservabilityReconciler>,
    /// Requeue interval after a completed or failed run
    pub requeue_interval: Duration,
}

impl Context {
    /// Create a controller context backed by a real Kubernetes client
    pub fn new(client: Client, stages: observability_grafana::Context, requeue: Duration) -> Self {
        Self {
            kube: Arc::new(ObservabilityKubeClientImpl::new(client)),
            stages,
            reconciler: Arc::new(GrafanaInstallationReconciler::new()),
            requeue_interval: requeue,
        }
    }
}

/// Reconcile one Observability resource.
///
/// Adds the finalizer on first sight, runs the installation stages, records
/// the report on the status, and requeues. On deletion runs teardown and
/// releases the finalizer once everything is gone.
#[instrument(skip(obs, ctx), fields(observability = %obs.name_any(), namespace = %obs.namespace().unwrap_or_default()))]
pub async fn reconcile(obs: Arc<Observability>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = obs.name_any();
    let namespace = obs
        .namespace()
        .ok_or_else(|| Error::validation_for(&name, "metadata.namespace is required"))?;

    if obs.metadata.deletion_timestamp.is_some() {
        return handle_deletion(&obs, &ctx, &namespace).await;
    }

    if !has_finalizer(&obs) {
        info!("adding finalizer");
        ctx.kube
            .add_finalizer(&namespace, &name, OBSERVABILITY_FINALIZER)
            .await?;
        return Ok(Action::requeue(FINALIZER_REQUEUE));
    }

    let tenant = match TenantDescriptor::from_observability(&obs, &ctx.stages.config) {
        Ok(tenant) => tenant,
        Err(e) => {
            warn!(error = %e, "invalid observability resource");
            let status = ObservabilityStatus {
                stage: None,
                stage_status: StageStatus::Failed,
                message: Some(e.to_string()),
            };
            record_status(&obs, &ctx, &namespace, status).await?;
            return Ok(Action::await_change());
        }
    };

    let report = ctx.reconciler.reconcile(&ctx.stages, &tenant).await;
    record_status(&obs, &ctx, &namespace, status_from(&report)).await?;

    match report.outcome {
        StageOutcome::Success => {
            debug!("grafana installation converged");
            Ok(Action::requeue(ctx.requeue_interval))
        }
        StageOutcome::InProgress => Ok(Action::requeue(ctx.requeue_interval)),
        StageOutcome::Failed(e) => Err(e),
    }
}

/// Error policy for the controller
pub fn error_policy(obs: Arc<Observability>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        observability = %obs.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );
    Action::requeue(ctx.requeue_interval)
}

async fn handle_deletion(
    obs: &Observability,
    ctx: &Context,
    namespace: &str,
) -> Result<Action, Error> {
    if !has_finalizer(obs) {
        return Ok(Action::await_change());
    }

    let name = obs.name_any();
    // Teardown is keyed on the namespace only; an invalid spec must not block deletion
    let tenant = TenantDescriptor::new(namespace, ctx.stages.config.default_version.clone());
    let report = ctx.reconciler.cleanup(&ctx.stages, &tenant).await;
    match report.outcome {
        StageOutcome::Success => {
            info!("grafana installation removed, releasing finalizer");
            ctx.kube
                .remove_finalizer(namespace, &name, OBSERVABILITY_FINALIZER)
                .await?;
            Ok(Action::await_change())
        }
        StageOutcome::InProgress => Ok(Action::requeue(ctx.requeue_interval)),
        StageOutcome::Failed(e) => Err(e),
    }
}

async fn record_status(
    obs: &Observability,
    ctx: &Context,
    namespace: &str,
    status: ObservabilityStatus,
) -> Result<(), Error> {
    if obs.status.as_ref() == Some(&status) {
        debug!("status unchanged");
        return Ok(());
    }
    ctx.kube
        .patch_status(namespace, &obs.name_any(), &status)
        .await
}

fn status_from(report: &StageReport) -> ObservabilityStatus {
    ObservabilityStatus {
        stage: report.stage.map(str::to_string),
        stage_status: report.outcome.status(),
        message: report.message(),
    }
}

fn has_finalizer(obs: &Observability) -> bool {
    obs.finalizers().iter().any(|f| f == OBSERVABILITY_FINALIZER)
}
