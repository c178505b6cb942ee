//! # Controller
//!
//! Core controller modules for the cloud connectors.
//!
//! - `backoff`: Fibonacci backoff mechanism for retries
//! - `reconciler`: Kind-agnostic reconcile protocol
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod reconciler;
pub mod server;
