//! Observability Custom Resource Definition
//!
//! An Observability resource names the tenant namespace the grafana operator
//! is installed into and optionally pins its version and resource budget.

use k8s_openapi::api::core::v1::ResourceRequirements;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Result of the last stage run, as recorded on the resource status
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum StageStatus {
    /// The stage converged
    Success,
    /// The stage is waiting on an asynchronous external process
    #[default]
    InProgress,
    /// The stage hit an error and will be retried on the next invocation
    Failed,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Status of an Observability resource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityStatus {
    /// Name of the last stage that ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    /// Outcome of that stage
    #[serde(default)]
    pub stage_status: StageStatus,

    /// Error text when the stage failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Specification for an Observability tenant
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "observability.redhat.com",
    version = "v1",
    kind = "Observability",
    plural = "observabilities",
    namespaced,
    status = "ObservabilityStatus",
    printcolumn = r#"{"name":"Stage","type":"string","jsonPath":".status.stage"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.stageStatus"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilitySpec {
    /// Grafana operator version to install (e.g. "v4.2.0").
    /// Falls back to the operator's configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grafana_operator_version: Option<String>,

    /// Resource requests/limits for the grafana operator pod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grafana_operator_resources: Option<ResourceRequirements>,
}
