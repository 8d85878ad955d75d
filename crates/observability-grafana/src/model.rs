//! Desired-state derivation for the grafana operator installation
//!
//! Pure functions from a [`TenantDescriptor`] to the objects the stages
//! converge. Names and namespaces depend only on the tenant, so every
//! reconcile targets the same keys.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::ResourceExt;

use observability_common::crd::{
    CatalogSource, CatalogSourceSpec, Observability, OperatorGroup, OperatorGroupSpec, SourceType,
    Subscription, SubscriptionConfig, SubscriptionSpec,
};
use observability_common::kube_utils::managed_metadata;
use observability_common::Error;

/// Registry hosting the grafana operator index image
pub const DEFAULT_REGISTRY: &str = "quay.io/rhoas";

/// Grafana operator version installed when the tenant does not pin one
pub const DEFAULT_GRAFANA_OPERATOR_VERSION: &str = "v4.2.0";

/// Index image name (without registry or tag)
pub const GRAFANA_INDEX_IMAGE: &str = "grafana-operator-index";

/// OLM package name of the grafana operator
pub const GRAFANA_PACKAGE: &str = "grafana-operator";

/// Subscription channel
pub const GRAFANA_CHANNEL: &str = "alpha";

/// Name of the managed CatalogSource
pub const GRAFANA_CATALOG_SOURCE_NAME: &str = "grafana-operator-catalog-source";

/// Name of the managed Subscription
pub const GRAFANA_SUBSCRIPTION_NAME: &str = "grafana-subscription";

/// Name of the managed OperatorGroup
pub const OPERATOR_GROUP_NAME: &str = "observability-operatorgroup";

/// Name of the deployment OLM creates for the grafana operator
pub const GRAFANA_OPERATOR_DEPLOYMENT: &str = "grafana-operator";

/// Prefix of grafana operator ClusterServiceVersion names (`grafana-operator.v4.2.0`)
pub const GRAFANA_CSV_PREFIX: &str = "grafana-operator.";

/// Catalog namespace of the pre-rename community install
pub const LEGACY_CATALOG_NAMESPACE: &str = "openshift-marketplace";

/// Catalog source of the pre-rename community install
pub const LEGACY_CATALOG_SOURCE: &str = "community-operators";

/// Operator-wide settings that are not per-tenant
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallConfig {
    /// Registry the index image is pulled from
    pub registry: String,
    /// Version used when an Observability does not pin one
    pub default_version: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            registry: DEFAULT_REGISTRY.to_string(),
            default_version: DEFAULT_GRAFANA_OPERATOR_VERSION.to_string(),
        }
    }
}

/// The tenant a reconcile converges toward
///
/// Read-only input for one invocation. Derived from an [`Observability`]
/// resource by [`TenantDescriptor::from_observability`].
#[derive(Clone, Debug, PartialEq)]
pub struct TenantDescriptor {
    /// Namespace everything is installed into
    pub namespace: String,
    /// Grafana operator version (e.g. "v4.2.0")
    pub version: String,
    /// Resource requests/limits override for the operator pod
    pub resources: Option<ResourceRequirements>,
}

impl TenantDescriptor {
    /// Create a descriptor with default resources
    pub fn new(namespace: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            version: version.into(),
            resources: None,
        }
    }

    /// Override the operator pod resources
    pub fn with_resources(mut self, resources: ResourceRequirements) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Derive the descriptor from an Observability resource.
    ///
    /// The namespace comes from the resource's metadata; the version from
    /// `spec.grafanaOperatorVersion`, falling back to `config.default_version`.
    pub fn from_observability(obs: &Observability, config: &InstallConfig) -> Result<Self, Error> {
        let name = obs.name_any();
        let namespace = obs
            .namespace()
            .filter(|ns| !ns.is_empty())
            .ok_or_else(|| Error::validation_for(&name, "metadata.namespace is required"))?;

        let version = obs
            .spec
            .grafana_operator_version
            .clone()
            .unwrap_or_else(|| config.default_version.clone());
        if version.trim().is_empty() {
            return Err(Error::validation_for(
                &name,
                "spec.grafanaOperatorVersion must not be empty",
            ));
        }

        Ok(Self {
            namespace,
            version,
            resources: obs.spec.grafana_operator_resources.clone(),
        })
    }
}

/// Index image reference for a version: `<registry>/grafana-operator-index:<version>`
pub fn catalog_source_image(registry: &str, version: &str) -> String {
    format!("{}/{}:{}", registry, GRAFANA_INDEX_IMAGE, version)
}

/// ClusterServiceVersion the subscription pins: `grafana-operator.<version>`
pub fn starting_csv(version: &str) -> String {
    format!("{}.{}", GRAFANA_PACKAGE, version)
}

/// Desired CatalogSource for the tenant
pub fn catalog_source(tenant: &TenantDescriptor, config: &InstallConfig) -> CatalogSource {
    let mut source = CatalogSource::new(
        GRAFANA_CATALOG_SOURCE_NAME,
        CatalogSourceSpec {
            source_type: SourceType::Grpc,
            image: Some(catalog_source_image(&config.registry, &tenant.version)),
            display_name: None,
        },
    );
    source.metadata = managed_metadata(GRAFANA_CATALOG_SOURCE_NAME, &tenant.namespace);
    source
}

/// Desired Subscription for the tenant, referencing [`catalog_source`]
pub fn subscription(tenant: &TenantDescriptor) -> Subscription {
    let mut sub = Subscription::new(
        GRAFANA_SUBSCRIPTION_NAME,
        SubscriptionSpec {
            catalog_source: GRAFANA_CATALOG_SOURCE_NAME.to_string(),
            catalog_source_namespace: tenant.namespace.clone(),
            package: GRAFANA_PACKAGE.to_string(),
            channel: Some(GRAFANA_CHANNEL.to_string()),
            starting_csv: Some(starting_csv(&tenant.version)),
            config: Some(SubscriptionConfig {
                resources: Some(operator_resources(tenant)),
            }),
        },
    );
    sub.metadata = managed_metadata(GRAFANA_SUBSCRIPTION_NAME, &tenant.namespace);
    sub
}

/// Desired OperatorGroup, scoped to exactly the tenant namespace
pub fn operator_group(tenant: &TenantDescriptor) -> OperatorGroup {
    let mut group = OperatorGroup::new(
        OPERATOR_GROUP_NAME,
        OperatorGroupSpec {
            target_namespaces: vec![tenant.namespace.clone()],
        },
    );
    group.metadata = managed_metadata(OPERATOR_GROUP_NAME, &tenant.namespace);
    group
}

/// Resources for the grafana operator pod: the tenant override or the default budget
pub fn operator_resources(tenant: &TenantDescriptor) -> ResourceRequirements {
    tenant
        .resources
        .clone()
        .unwrap_or_else(default_operator_resources)
}

fn default_operator_resources() -> ResourceRequirements {
    let quantities = |cpu: &str, memory: &str| {
        BTreeMap::from([
            ("cpu".to_string(), Quantity(cpu.to_string())),
            ("memory".to_string(), Quantity(memory.to_string())),
        ])
    };
    ResourceRequirements {
        requests: Some(quantities("100m", "256Mi")),
        limits: Some(quantities("500m", "512Mi")),
        ..Default::default()
    }
}

/// True for the subscription left behind by the community-catalog install
///
/// Matches only on the managed subscription name plus the exact legacy
/// catalog pair; any other subscription is not a migration target.
pub fn is_legacy_subscription(sub: &Subscription) -> bool {
    sub.metadata.name.as_deref() == Some(GRAFANA_SUBSCRIPTION_NAME)
        && sub.spec.catalog_source_namespace == LEGACY_CATALOG_NAMESPACE
        && sub.spec.catalog_source == LEGACY_CATALOG_SOURCE
}

/// True for a grafana operator installed-version record
pub fn is_grafana_csv(name: &str) -> bool {
    name.starts_with(GRAFANA_CSV_PREFIX)
}
