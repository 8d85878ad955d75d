//! Observability operator host
//!
//! Watches Observability resources and drives each tenant through the
//! grafana installation stages, recording the last stage and its outcome on
//! the resource status. Deletion is gated by a finalizer that runs the
//! teardown before the resource is released.

pub mod controller;
