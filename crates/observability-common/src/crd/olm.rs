//! Operator Lifecycle Manager resource types
//!
//! Typed views of the OLM kinds the grafana installation converges:
//! CatalogSource, Subscription, OperatorGroup and ClusterServiceVersion.
//! Only the fields this operator reads or writes are modeled; schemas are
//! owned by OLM, so none are generated here.

use k8s_openapi::api::core::v1::ResourceRequirements;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// How a CatalogSource serves its package index
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Index served from a gRPC image reference
    #[default]
    Grpc,
    /// Index embedded in a ConfigMap
    #[serde(rename = "configmap")]
    ConfigMap,
    /// Index built into OLM
    Internal,
}

/// CatalogSource spec: a pointer to a package index image
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "operators.coreos.com",
    version = "v1alpha1",
    kind = "CatalogSource",
    plural = "catalogsources",
    namespaced,
    schema = "disabled",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSourceSpec {
    /// Index transport
    #[serde(default)]
    pub source_type: SourceType,

    /// Index image reference (`<registry>/<image>:<tag>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Human-readable name shown by OLM tooling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Overrides applied to the operator deployment OLM installs
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionConfig {
    /// Resource requests/limits for the operator container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

/// Subscription spec: install one package from one catalog source
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "operators.coreos.com",
    version = "v1alpha1",
    kind = "Subscription",
    plural = "subscriptions",
    namespaced,
    schema = "disabled",
    derive = "PartialEq"
)]
pub struct SubscriptionSpec {
    /// Name of the CatalogSource to resolve the package from
    #[serde(rename = "source", default)]
    pub catalog_source: String,

    /// Namespace of that CatalogSource
    #[serde(rename = "sourceNamespace", default)]
    pub catalog_source_namespace: String,

    /// Package name within the catalog
    #[serde(rename = "name", default)]
    pub package: String,

    /// Update channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Exact ClusterServiceVersion to start from
    #[serde(rename = "startingCSV", default, skip_serializing_if = "Option::is_none")]
    pub starting_csv: Option<String>,

    /// Deployment overrides for the installed operator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<SubscriptionConfig>,
}

/// OperatorGroup spec: the namespaces an installed operator may watch
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "operators.coreos.com",
    version = "v1",
    kind = "OperatorGroup",
    plural = "operatorgroups",
    namespaced,
    schema = "disabled",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct OperatorGroupSpec {
    /// Namespaces targeted by member operators
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_namespaces: Vec<String>,
}

/// ClusterServiceVersion spec: the installed-version record of an operator
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "operators.coreos.com",
    version = "v1alpha1",
    kind = "ClusterServiceVersion",
    plural = "clusterserviceversions",
    namespaced,
    schema = "disabled",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterServiceVersionSpec {
    /// Display name of the operator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Semantic version of the operator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
