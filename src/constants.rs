//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables (see [`crate::config::ControllerConfig`]).

/// Label placed on every derived ConfigMap
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`]
pub const MANAGED_BY_VALUE: &str = "cloud-connectors-controller";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default interval between periodic resyncs of a healthy object (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;

/// Default Fibonacci backoff starting value (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default Fibonacci backoff maximum value (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default number of refetch-and-reapply attempts after a write conflict
pub const DEFAULT_CONFLICT_RETRY_LIMIT: u32 = 3;

/// Default number of objects reconciled concurrently per kind
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default cloud region used to sign SQS and S3 requests
pub const DEFAULT_CLOUD_REGION: &str = "ru-central1";

/// Default Message Queue endpoint (SQS-compatible)
pub const DEFAULT_MESSAGE_QUEUE_ENDPOINT: &str = "https://message-queue.api.cloud.yandex.net";

/// Default Object Storage endpoint (S3-compatible)
pub const DEFAULT_OBJECT_STORAGE_ENDPOINT: &str = "https://storage.yandexcloud.net";

/// Default Container Registry REST endpoint
pub const DEFAULT_CONTAINER_REGISTRY_ENDPOINT: &str =
    "https://container-registry.api.cloud.yandex.net/container-registry/v1";

/// Compute metadata endpoint issuing IAM tokens for the instance service account
pub const DEFAULT_METADATA_TOKEN_URL: &str =
    "http://169.254.169.254/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh cached IAM tokens this long before they expire (seconds)
pub const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

/// Key inside the static access key Secret holding the key id
pub const STATIC_KEY_ID_FIELD: &str = "key";

/// Key inside the static access key Secret holding the secret part
pub const STATIC_KEY_SECRET_FIELD: &str = "secret";
