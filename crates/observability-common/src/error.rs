//! Error types for the observability operator
//!
//! Errors are structured with fields to aid debugging in production.
//! Store errors keep the underlying kube-rs error; missing objects get their
//! own variant so stages can tolerate them where deletion is idempotent.

use thiserror::Error;

/// Main error type for observability operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The resource store reported the object as absent
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Resource kind (e.g., "Subscription")
        kind: String,
        /// Namespace the lookup was scoped to
        namespace: String,
        /// Name of the missing object
        name: String,
    },

    /// Validation error for an Observability resource
    #[error("validation error for {resource}: {message}")]
    Validation {
        /// Name of the resource with invalid configuration
        resource: String,
        /// Description of what's invalid
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error for {kind}: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized
        kind: String,
    },

    /// The caller cancelled the reconcile while a stage was running
    #[error("cancelled during stage {stage}")]
    Cancelled {
        /// Stage that was interrupted
        stage: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "controller", "finalizer")
        context: String,
    },
}

impl Error {
    /// Create a not-found error for the given object key
    pub fn not_found(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create a validation error for a named resource
    pub fn validation_for(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error for a resource kind
    pub fn serialization(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: kind.into(),
        }
    }

    /// Create a cancellation error for the named stage
    pub fn cancelled(stage: impl Into<String>) -> Self {
        Self::Cancelled {
            stage: stage.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check whether this error means the object does not exist
    ///
    /// Covers both the explicit `NotFound` variant and a raw 404 from the API
    /// server that was not translated by the store.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 404,
            _ => false,
        }
    }

    /// Check if this error is retryable
    ///
    /// Validation and serialization errors need a spec or code fix.
    /// Everything else is resolved by invoking the reconcile again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code) && ae.code != 404 && ae.code != 409
            ),
            Error::NotFound { .. } => true,
            Error::Validation { .. } => false,
            Error::Serialization { .. } => false,
            Error::Cancelled { .. } => true,
            Error::Internal { .. } => true,
        }
    }
}
