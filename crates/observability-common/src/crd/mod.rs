//! Custom resource types: the Observability CRD this operator owns and the
//! OLM kinds it drives.

mod observability;
mod olm;

pub use observability::{Observability, ObservabilitySpec, ObservabilityStatus, StageStatus};
pub use olm::{
    CatalogSource, CatalogSourceSpec, ClusterServiceVersion, ClusterServiceVersionSpec,
    OperatorGroup, OperatorGroupSpec, SourceType, Subscription, SubscriptionConfig,
    SubscriptionSpec,
};
