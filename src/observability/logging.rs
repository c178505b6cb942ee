//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over the configured level when set.

use crate::config::{ControllerConfig, LogFormat};
use tracing_subscriber::EnvFilter;

fn env_filter(config: &ControllerConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "cloud_connectors={level},cloud_connectors_controller={level},kube=warn",
            level = config.log_level.to_ascii_lowercase()
        )
        .into()
    })
}

/// Install the global subscriber in the configured format
pub fn init_tracing(config: &ControllerConfig) {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(config));
    match config.log_format {
        LogFormat::Json => builder.json().with_current_span(true).init(),
        LogFormat::Text => builder.init(),
    }
}
