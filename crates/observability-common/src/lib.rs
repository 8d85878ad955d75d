//! Common types for the observability operator: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod kube_utils;

pub use error::Error;
pub use kube_utils::ApplyResult;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Standard Kubernetes name label
pub const LABEL_NAME: &str = "app.kubernetes.io/name";

/// Standard Kubernetes managed-by label
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of the managed-by label for objects this operator owns
pub const LABEL_MANAGED_BY_OBSERVABILITY: &str = "observability-operator";
