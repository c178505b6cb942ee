//! Cloud Connectors Controller Library
//!
//! Kubernetes controllers that keep Yandex Cloud resources (container
//! registries, message queues and object storage buckets) in step with
//! custom resources.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod provider;
pub mod runtime;
pub mod store;
