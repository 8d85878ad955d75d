//! Shared Kubernetes utilities using kube-rs
//!
//! Provides the create-or-update and delete primitives the stages converge
//! with. Every helper takes an already-scoped `Api<K>` so callers decide the
//! namespace; nothing here retries or sleeps.

use std::collections::BTreeMap;
use std::fmt::Debug;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::{Error, LABEL_MANAGED_BY, LABEL_MANAGED_BY_OBSERVABILITY, LABEL_NAME};

/// Outcome of a create-or-update call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyResult {
    /// The object did not exist and was created
    Created,
    /// The object existed and its mutated form was written back
    Updated,
    /// The object already matched; no write was issued
    Unchanged,
}

impl std::fmt::Display for ApplyResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Build metadata for an object owned by this operator.
///
/// Adds the standard name and managed-by labels.
pub fn managed_metadata(name: impl Into<String>, namespace: impl Into<String>) -> ObjectMeta {
    let name = name.into();
    let labels = BTreeMap::from([
        (LABEL_NAME.to_string(), name.clone()),
        (
            LABEL_MANAGED_BY.to_string(),
            LABEL_MANAGED_BY_OBSERVABILITY.to_string(),
        ),
    ]);
    ObjectMeta {
        name: Some(name),
        namespace: Some(namespace.into()),
        labels: Some(labels),
        ..Default::default()
    }
}

fn kind_of<K>() -> String
where
    K: Resource,
    K::DynamicType: Default,
{
    K::kind(&K::DynamicType::default()).to_string()
}

/// Returns true when `mutated` differs from `observed` once both are serialized.
///
/// Comparison is on the JSON form so server-populated fields that the
/// mutator does not touch never register as drift.
pub fn needs_update<K>(observed: &K, mutated: &K) -> Result<bool, Error>
where
    K: Resource + Serialize,
    K::DynamicType: Default,
{
    let to_value = |obj: &K| {
        serde_json::to_value(obj).map_err(|e| Error::serialization(kind_of::<K>(), e.to_string()))
    };
    Ok(to_value(observed)? != to_value(mutated)?)
}

/// Apply `mutate` to a copy of `observed`.
///
/// Returns the object to write back, or None when the mutation changed
/// nothing. The observed metadata, `resourceVersion` included, is carried
/// over untouched.
pub fn mutated_if_changed<K, F>(observed: &K, mutate: F) -> Result<Option<K>, Error>
where
    K: Resource + Clone + Serialize,
    K::DynamicType: Default,
    F: FnOnce(&mut K),
{
    let mut obj = observed.clone();
    mutate(&mut obj);
    Ok(needs_update(observed, &obj)?.then_some(obj))
}

/// Fetch-or-create an object, apply `mutate`, and persist the result.
///
/// If the object is absent, `mutate` is applied to `template` and the result
/// is created. If present, `mutate` is applied to the observed object and it
/// is replaced only when something changed. Because the observed
/// `resourceVersion` is kept, a concurrent writer surfaces as a 409.
pub async fn create_or_update<K, F>(
    api: &Api<K>,
    template: K,
    mutate: F,
) -> Result<ApplyResult, Error>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Debug,
    K::DynamicType: Default,
    F: FnOnce(&mut K),
{
    let kind = kind_of::<K>();
    let name = template.meta().name.clone().ok_or_else(|| {
        Error::internal_with_context("create_or_update", format!("{} template has no name", kind))
    })?;

    match api.get_opt(&name).await? {
        None => {
            let mut obj = template;
            mutate(&mut obj);
            api.create(&PostParams::default(), &obj).await?;
            info!(kind = %kind, name = %name, "created");
            Ok(ApplyResult::Created)
        }
        Some(observed) => match mutated_if_changed(&observed, mutate)? {
            None => {
                debug!(kind = %kind, name = %name, "already converged");
                Ok(ApplyResult::Unchanged)
            }
            Some(obj) => {
                api.replace(&name, &PostParams::default(), &obj).await?;
                info!(kind = %kind, name = %name, "updated");
                Ok(ApplyResult::Updated)
            }
        },
    }
}

/// List every object of a kind visible through `api`.
pub async fn list_all<K>(api: &Api<K>) -> Result<Vec<K>, Error>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    Ok(api.list(&ListParams::default()).await?.items)
}

/// Delete an object by name, translating a 404 into [`Error::NotFound`].
pub async fn delete_object<K>(api: &Api<K>, namespace: &str, name: &str) -> Result<(), Error>
where
    K: Resource + Clone + DeserializeOwned + Debug,
    K::DynamicType: Default,
{
    let kind = kind_of::<K>();
    match api.delete(name, &DeleteParams::background()).await {
        Ok(_) => {
            info!(kind = %kind, namespace = %namespace, name = %name, "deleted");
            Ok(())
        }
        Err(e) => Err(classify_delete_error(e, &kind, namespace, name)),
    }
}

/// Map a failed delete to [`Error::NotFound`] when the API server answered 404.
pub fn classify_delete_error(err: kube::Error, kind: &str, namespace: &str, name: &str) -> Error {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => Error::not_found(kind, namespace, name),
        e => e.into(),
    }
}
