//! Resource store access for the grafana installation
//!
//! [`GrafanaKubeClient`] is the only way the stages touch the cluster. The
//! production implementation wraps a `kube::Client`; tests substitute a mock
//! or an in-memory store.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::Api;
use kube::Client;

#[cfg(test)]
use mockall::automock;

use observability_common::crd::{
    CatalogSource, ClusterServiceVersion, OperatorGroup, Subscription,
};
use observability_common::kube_utils::{create_or_update, delete_object, list_all};
use observability_common::{ApplyResult, Error};

/// Trait abstracting Kubernetes client operations for the grafana installation
///
/// Deletes report an absent object as [`Error::NotFound`]; callers decide
/// whether that is acceptable. `apply_*` methods create the object when
/// missing and otherwise overwrite its spec with the desired one.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GrafanaKubeClient: Send + Sync {
    /// List Subscriptions in a namespace
    async fn list_subscriptions(&self, namespace: &str) -> Result<Vec<Subscription>, Error>;

    /// List ClusterServiceVersions in a namespace
    async fn list_cluster_service_versions(
        &self,
        namespace: &str,
    ) -> Result<Vec<ClusterServiceVersion>, Error>;

    /// List OperatorGroups in a namespace
    async fn list_operator_groups(&self, namespace: &str) -> Result<Vec<OperatorGroup>, Error>;

    /// List Deployments in a namespace
    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, Error>;

    /// Create or overwrite a CatalogSource
    async fn apply_catalog_source(&self, desired: &CatalogSource) -> Result<ApplyResult, Error>;

    /// Create or overwrite a Subscription
    async fn apply_subscription(&self, desired: &Subscription) -> Result<ApplyResult, Error>;

    /// Create or overwrite an OperatorGroup
    async fn apply_operator_group(&self, desired: &OperatorGroup) -> Result<ApplyResult, Error>;

    /// Delete a CatalogSource
    async fn delete_catalog_source(&self, namespace: &str, name: &str) -> Result<(), Error>;

    /// Delete a Subscription
    async fn delete_subscription(&self, namespace: &str, name: &str) -> Result<(), Error>;

    /// Delete an OperatorGroup
    async fn delete_operator_group(&self, namespace: &str, name: &str) -> Result<(), Error>;

    /// Delete a ClusterServiceVersion
    async fn delete_cluster_service_version(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), Error>;

    /// Delete a Deployment
    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct GrafanaKubeClientImpl {
    client: Client,
}

impl GrafanaKubeClientImpl {
    /// Create a new GrafanaKubeClientImpl wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = kube::core::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn namespace_of<K: kube::Resource>(obj: &K) -> Result<String, Error> {
    obj.meta()
        .namespace
        .clone()
        .ok_or_else(|| {
            Error::internal_with_context("grafana-client", "desired object has no namespace")
        })
}

#[async_trait]
impl GrafanaKubeClient for GrafanaKubeClientImpl {
    async fn list_subscriptions(&self, namespace: &str) -> Result<Vec<Subscription>, Error> {
        list_all(&self.api::<Subscription>(namespace)).await
    }

    async fn list_cluster_service_versions(
        &self,
        namespace: &str,
    ) -> Result<Vec<ClusterServiceVersion>, Error> {
        list_all(&self.api::<ClusterServiceVersion>(namespace)).await
    }

    async fn list_operator_groups(&self, namespace: &str) -> Result<Vec<OperatorGroup>, Error> {
        list_all(&self.api::<OperatorGroup>(namespace)).await
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, Error> {
        list_all(&self.api::<Deployment>(namespace)).await
    }

    async fn apply_catalog_source(&self, desired: &CatalogSource) -> Result<ApplyResult, Error> {
        let api = self.api::<CatalogSource>(&namespace_of(desired)?);
        let spec = desired.spec.clone();
        create_or_update(&api, desired.clone(), |source| source.spec = spec).await
    }

    async fn apply_subscription(&self, desired: &Subscription) -> Result<ApplyResult, Error> {
        let api = self.api::<Subscription>(&namespace_of(desired)?);
        let spec = desired.spec.clone();
        create_or_update(&api, desired.clone(), |sub| sub.spec = spec).await
    }

    async fn apply_operator_group(&self, desired: &OperatorGroup) -> Result<ApplyResult, Error> {
        let api = self.api::<OperatorGroup>(&namespace_of(desired)?);
        let spec = desired.spec.clone();
        create_or_update(&api, desired.clone(), |group| group.spec = spec).await
    }

    async fn delete_catalog_source(&self, namespace: &str, name: &str) -> Result<(), Error> {
        delete_object(&self.api::<CatalogSource>(namespace), namespace, name).await
    }

    async fn delete_subscription(&self, namespace: &str, name: &str) -> Result<(), Error> {
        delete_object(&self.api::<Subscription>(namespace), namespace, name).await
    }

    async fn delete_operator_group(&self, namespace: &str, name: &str) -> Result<(), Error> {
        delete_object(&self.api::<OperatorGroup>(namespace), namespace, name).await
    }

    async fn delete_cluster_service_version(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), Error> {
        delete_object(
            &self.api::<ClusterServiceVersion>(namespace),
            namespace,
            name,
        )
        .await
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), Error> {
        delete_object(&self.api::<Deployment>(namespace), namespace, name).await
    }
}
