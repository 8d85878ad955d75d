//! Convergence stages for the grafana operator installation.
//!
//! Each stage computes a desired shape, compares it with what the store
//! holds, issues the minimal write, and reports a [`StageOutcome`]. Stages
//! keep no state between calls; the cluster is the progress record.

pub mod catalog_source;
pub mod cleanup;
pub mod migration;
pub mod operator_group;
pub mod readiness;
pub mod subscription;

pub use catalog_source::CatalogSourceStage;
pub use cleanup::CleanupStage;
pub use migration::MigrationStage;
pub use operator_group::OperatorGroupStage;
pub use readiness::ReadinessStage;
pub use subscription::SubscriptionStage;

use async_trait::async_trait;

use observability_common::crd::StageStatus;
use observability_common::Error;

use crate::model::TenantDescriptor;
use crate::reconciler::Context;

/// Result of running one stage
#[derive(Debug)]
pub enum StageOutcome {
    /// The stage converged; the next stage may run
    Success,
    /// Waiting on an asynchronous external process; re-invoke later
    InProgress,
    /// The stage hit an error; re-invoke later
    Failed(Error),
}

impl StageOutcome {
    /// Returns true for [`StageOutcome::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// The status recorded on the Observability resource
    pub fn status(&self) -> StageStatus {
        match self {
            Self::Success => StageStatus::Success,
            Self::InProgress => StageStatus::InProgress,
            Self::Failed(_) => StageStatus::Failed,
        }
    }

    /// The error carried by a failed outcome
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Result<StageOutcome, Error>> for StageOutcome {
    fn from(result: Result<StageOutcome, Error>) -> Self {
        result.unwrap_or_else(StageOutcome::Failed)
    }
}

/// One step of the installation pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stable name used in logs and on the resource status
    fn name(&self) -> &'static str;

    /// Run the stage once against the current cluster state
    async fn run(&self, ctx: &Context, tenant: &TenantDescriptor) -> StageOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_status_projection() {
        assert_eq!(StageOutcome::Success.status(), StageStatus::Success);
        assert_eq!(StageOutcome::InProgress.status(), StageStatus::InProgress);
        assert_eq!(
            StageOutcome::Failed(Error::internal_with_context("store", "boom")).status(),
            StageStatus::Failed
        );
    }

    #[test]
    fn errors_become_failed_outcomes() {
        let outcome =
            StageOutcome::from(Err(Error::internal_with_context("store", "store unavailable")));
        assert!(!outcome.is_success());
        assert!(outcome
            .error()
            .is_some_and(|e| e.to_string().contains("store unavailable")));

        assert!(StageOutcome::from(Ok(StageOutcome::Success)).is_success());
        assert!(StageOutcome::from(Ok(StageOutcome::InProgress)).error().is_none());
    }
}
