//! Grafana operator installation for Observability tenants
//!
//! Installs the grafana operator into a tenant namespace through the
//! Operator Lifecycle Manager and removes it again on teardown. The work is
//! split into idempotent [`stages`] driven by a [`reconciler::Sequencer`];
//! desired objects come from [`model`] and all cluster access goes through
//! [`client::GrafanaKubeClient`].

pub mod client;
pub mod model;
pub mod reconciler;
pub mod stages;

pub use client::{GrafanaKubeClient, GrafanaKubeClientImpl};
pub use model::{InstallConfig, TenantDescriptor};
pub use reconciler::{
    Context, GrafanaInstallationReconciler, ObservabilityReconciler, Sequencer, StageReport,
};
pub use stages::{Stage, StageOutcome};
