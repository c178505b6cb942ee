//! # Configuration
//!
//! Controller configuration is an explicit value built once at startup and
//! handed to every reconciler. Nothing reads the environment after that.

mod controller;

pub use controller::{ControllerConfig, FatalErrorPolicy, LogFormat};
