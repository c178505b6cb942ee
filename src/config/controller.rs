//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// What to do after a reconcile fails with a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FatalErrorPolicy {
    /// Keep retrying with the regular Fibonacci backoff
    #[default]
    Requeue,
    /// Stop scheduling retries until the object changes
    AwaitChange,
}

impl FromStr for FatalErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "requeue" => Ok(Self::Requeue),
            "await-change" | "await_change" | "awaitchange" => Ok(Self::AwaitChange),
            other => Err(format!(
                "unknown fatal error policy '{other}', expected 'requeue' or 'await-change'"
            )),
        }
    }
}

impl fmt::Display for FatalErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requeue => f.write_str("requeue"),
            Self::AwaitChange => f.write_str("await-change"),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "plain" => Ok(Self::Text),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// HTTP port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Interval between periodic resyncs of a healthy object (seconds)
    pub resync_interval_secs: u64,
    /// Fibonacci backoff starting value (seconds)
    pub backoff_min_secs: u64,
    /// Fibonacci backoff maximum value (seconds)
    pub backoff_max_secs: u64,
    /// Refetch-and-reapply attempts after an optimistic concurrency conflict
    pub conflict_retry_limit: u32,
    /// Retry behaviour after fatal errors
    pub fatal_error_policy: FatalErrorPolicy,
    /// Maximum concurrent reconciliations per resource kind
    pub max_concurrent_reconciliations: u16,
    /// Namespace to watch; `None` watches all namespaces
    pub watch_namespace: Option<String>,
    /// Region used when signing SQS and S3 requests
    pub cloud_region: String,
    pub message_queue_endpoint: String,
    pub object_storage_endpoint: String,
    pub container_registry_endpoint: String,
    /// Metadata endpoint issuing IAM tokens for the instance service account
    pub metadata_token_url: String,
    /// Default log level when `RUST_LOG` is not set
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            conflict_retry_limit: DEFAULT_CONFLICT_RETRY_LIMIT,
            fatal_error_policy: FatalErrorPolicy::default(),
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            watch_namespace: None,
            cloud_region: DEFAULT_CLOUD_REGION.to_string(),
            message_queue_endpoint: DEFAULT_MESSAGE_QUEUE_ENDPOINT.to_string(),
            object_storage_endpoint: DEFAULT_OBJECT_STORAGE_ENDPOINT.to_string(),
            container_registry_endpoint: DEFAULT_CONTAINER_REGISTRY_ENDPOINT.to_string(),
            metadata_token_url: DEFAULT_METADATA_TOKEN_URL.to_string(),
            log_level: "INFO".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup with defaults
    ///
    /// Unparseable values fall back to the default for that key.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut config = Self {
            metrics_port: parsed_or(&lookup, "METRICS_PORT", defaults.metrics_port),
            resync_interval_secs: parsed_or(
                &lookup,
                "RESYNC_INTERVAL_SECS",
                defaults.resync_interval_secs,
            ),
            backoff_min_secs: parsed_or(&lookup, "BACKOFF_MIN_SECS", defaults.backoff_min_secs),
            backoff_max_secs: parsed_or(&lookup, "BACKOFF_MAX_SECS", defaults.backoff_max_secs),
            conflict_retry_limit: parsed_or(
                &lookup,
                "CONFLICT_RETRY_LIMIT",
                defaults.conflict_retry_limit,
            ),
            fatal_error_policy: parsed_or(
                &lookup,
                "FATAL_ERROR_POLICY",
                defaults.fatal_error_policy,
            ),
            max_concurrent_reconciliations: parsed_or(
                &lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                defaults.max_concurrent_reconciliations,
            ),
            watch_namespace: lookup("WATCH_NAMESPACE").filter(|ns| !ns.trim().is_empty()),
            cloud_region: string_or(&lookup, "CLOUD_REGION", defaults.cloud_region),
            message_queue_endpoint: string_or(
                &lookup,
                "MESSAGE_QUEUE_ENDPOINT",
                defaults.message_queue_endpoint,
            ),
            object_storage_endpoint: string_or(
                &lookup,
                "OBJECT_STORAGE_ENDPOINT",
                defaults.object_storage_endpoint,
            ),
            container_registry_endpoint: string_or(
                &lookup,
                "CONTAINER_REGISTRY_ENDPOINT",
                defaults.container_registry_endpoint,
            ),
            metadata_token_url: string_or(
                &lookup,
                "METADATA_TOKEN_URL",
                defaults.metadata_token_url,
            ),
            log_level: string_or(&lookup, "LOG_LEVEL", defaults.log_level),
            log_format: parsed_or(&lookup, "LOG_FORMAT", defaults.log_format),
        };

        if config.backoff_min_secs == 0 {
            config.backoff_min_secs = 1;
        }
        if config.backoff_max_secs < config.backoff_min_secs {
            config.backoff_max_secs = config.backoff_min_secs;
        }
        if config.max_concurrent_reconciliations == 0 {
            config.max_concurrent_reconciliations = 1;
        }
        config
    }

    /// Get periodic resync duration
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }
}

fn parsed_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn string_or<F>(lookup: &F, key: &str, default: String) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}
