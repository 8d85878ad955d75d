//! Stage sequencing for the grafana operator installation
//!
//! The [`Sequencer`] runs the installation stages in a fixed order and
//! stops at the first stage that does not report Success. Nothing is stored
//! between calls: the next invocation re-runs every stage and resumes from
//! wherever the cluster currently sits.
//!
//! # Concurrency
//!
//! Callers must serialize invocations per tenant. The stages issue
//! unguarded read-then-write sequences, so two concurrent reconciles of the
//! same namespace can race. kube-runtime's controller already guarantees at
//! most one in-flight reconcile per object key.

use std::sync::Arc;

use async_trait::async_trait;
use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use observability_common::Error;

use crate::client::{GrafanaKubeClient, GrafanaKubeClientImpl};
use crate::model::{InstallConfig, TenantDescriptor};
use crate::stages::{
    CatalogSourceStage, CleanupStage, MigrationStage, OperatorGroupStage, ReadinessStage, Stage,
    StageOutcome, SubscriptionStage,
};

/// Shared inputs for every stage of one reconcile
pub struct Context {
    /// Resource store access (trait object for testability)
    pub kube: Arc<dyn GrafanaKubeClient>,
    /// Operator-wide install settings
    pub config: InstallConfig,
    /// Cancels the in-flight stage when triggered
    pub cancel: CancellationToken,
}

impl Context {
    /// Create a context backed by a real Kubernetes client
    pub fn new(client: Client) -> Self {
        Self::from_kube(Arc::new(GrafanaKubeClientImpl::new(client)))
    }

    /// Create a context over any store implementation
    pub fn from_kube(kube: Arc<dyn GrafanaKubeClient>) -> Self {
        Self {
            kube,
            config: InstallConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Create a context for unit tests with a mock store
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn GrafanaKubeClient>) -> Self {
        Self::from_kube(kube)
    }

    /// Replace the install settings
    pub fn with_config(mut self, config: InstallConfig) -> Self {
        self.config = config;
        self
    }

    /// Tie the context to a caller-owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// The last stage run and what it reported
#[derive(Debug)]
pub struct StageReport {
    /// Name of the stage that produced `outcome`; None when no stage ran
    pub stage: Option<&'static str>,
    /// Outcome of that stage
    pub outcome: StageOutcome,
}

impl StageReport {
    /// Message recorded on the resource status
    pub fn message(&self) -> Option<String> {
        self.outcome.error().map(ToString::to_string)
    }
}

/// Runs a stage, abandoning it if the context is cancelled first.
async fn run_stage(stage: &dyn Stage, ctx: &Context, tenant: &TenantDescriptor) -> StageOutcome {
    tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => StageOutcome::Failed(Error::cancelled(stage.name())),
        outcome = stage.run(ctx, tenant) => outcome,
    }
}

/// Ordered list of stages with short-circuit semantics
pub struct Sequencer {
    stages: Vec<Box<dyn Stage>>,
}

impl Sequencer {
    /// The grafana operator installation: migration, catalog source,
    /// subscription, operator group, readiness
    pub fn grafana_installation() -> Self {
        Self::with_stages(vec![
            Box::new(MigrationStage),
            Box::new(CatalogSourceStage),
            Box::new(SubscriptionStage),
            Box::new(OperatorGroupStage),
            Box::new(ReadinessStage),
        ])
    }

    /// Build a sequencer over an explicit stage list
    pub fn with_stages(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order and report the last one attempted.
    ///
    /// Stops at the first InProgress or Failed outcome. Earlier stages are
    /// not rolled back.
    #[instrument(skip_all, fields(namespace = %tenant.namespace, version = %tenant.version))]
    pub async fn run(&self, ctx: &Context, tenant: &TenantDescriptor) -> StageReport {
        let mut report = StageReport {
            stage: None,
            outcome: StageOutcome::Success,
        };

        for stage in &self.stages {
            let name = stage.name();
            let outcome = run_stage(stage.as_ref(), ctx, tenant).await;
            match &outcome {
                StageOutcome::Success => debug!(stage = name, "stage converged"),
                StageOutcome::InProgress => info!(stage = name, "stage in progress, yielding"),
                StageOutcome::Failed(e) => warn!(stage = name, error = %e, "stage failed"),
            }
            let done = !outcome.is_success();
            report = StageReport {
                stage: Some(name),
                outcome,
            };
            if done {
                return report;
            }
        }

        report
    }

    /// Run every stage in order and return the outcome that ended the run
    pub async fn reconcile(&self, ctx: &Context, tenant: &TenantDescriptor) -> StageOutcome {
        self.run(ctx, tenant).await.outcome
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::grafana_installation()
    }
}

/// Uniform entry points of a sub-component reconciler
///
/// Implementations are invoked once per scheduling cycle and must be safe
/// to re-invoke any number of times. At most one call per tenant may be in
/// flight; see the module docs.
#[async_trait]
pub trait ObservabilityReconciler: Send + Sync {
    /// Converge the sub-component toward the tenant's desired state
    async fn reconcile(&self, ctx: &Context, tenant: &TenantDescriptor) -> StageReport;

    /// Remove everything the sub-component installed for the tenant
    async fn cleanup(&self, ctx: &Context, tenant: &TenantDescriptor) -> StageReport;
}

/// Installs and removes the grafana operator through OLM
#[derive(Default)]
pub struct GrafanaInstallationReconciler {
    sequencer: Sequencer,
}

impl GrafanaInstallationReconciler {
    /// Create a reconciler running the standard installation stages
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObservabilityReconciler for GrafanaInstallationReconciler {
    async fn reconcile(&self, ctx: &Context, tenant: &TenantDescriptor) -> StageReport {
        self.sequencer.run(ctx, tenant).await
    }

    #[instrument(skip_all, fields(namespace = %tenant.namespace))]
    async fn cleanup(&self, ctx: &Context, tenant: &TenantDescriptor) -> StageReport {
        let stage = CleanupStage;
        let outcome = run_stage(&stage, ctx, tenant).await;
        if let Some(e) = outcome.error() {
            warn!(error = %e, "cleanup failed");
        }
        StageReport {
            stage: Some(stage.name()),
            outcome,
        }
    }
}
