//! # Common Provider Utilities
//!
//! Shared helpers for the SQS- and S3-compatible adapters: static credential
//! wiring, SDK error classification and per-operation metrics.

use super::error::{classify_error_code, ErrorClass};
use super::ProviderError;
use crate::observability::metrics;
use aws_credential_types::Credentials as AwsCredentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use std::time::Instant;

/// Name reported by static credentials in SDK debug output
const STATIC_CREDENTIALS_SOURCE: &str = "connector-static-key";

/// Endpoint and region shared by the AWS-compatible adapters
#[derive(Debug, Clone)]
pub(crate) struct EndpointConfig {
    pub endpoint: String,
    pub region: String,
}

/// Wrap a static access key for the AWS SDK
pub(crate) fn static_sdk_credentials(key_id: &str, secret: &str) -> AwsCredentials {
    AwsCredentials::new(key_id, secret, None, None, STATIC_CREDENTIALS_SOURCE)
}

/// Map an SDK failure onto the provider error taxonomy
///
/// Service errors are classified by their error code. A request that could not
/// even be built is fatal; any other wire failure is transient.
pub(crate) fn classify_sdk_error<E, R>(
    err: &SdkError<E, R>,
    subject: &str,
    action: &str,
) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let class = match err {
        SdkError::ServiceError(service) => classify_error_code(service.err().code()),
        SdkError::ConstructionFailure(_) => ErrorClass::Fatal,
        _ => ErrorClass::Transient,
    };
    let source = anyhow::anyhow!("{action} {subject}: {}", DisplayErrorContext(err));
    ProviderError::from_class(class, subject, source)
}

/// Tracks one provider operation and records its outcome
#[derive(Debug)]
pub(crate) struct OperationTracker {
    kind: &'static str,
    operation: &'static str,
    start: Instant,
}

impl OperationTracker {
    pub(crate) fn start(kind: &'static str, operation: &'static str) -> Self {
        Self {
            kind,
            operation,
            start: Instant::now(),
        }
    }

    /// Record the outcome and pass the result through
    pub(crate) fn finish<T>(self, result: Result<T, ProviderError>) -> Result<T, ProviderError> {
        let outcome = match &result {
            Ok(_) => "success",
            Err(ProviderError::NotFound(_)) => "not_found",
            Err(ProviderError::Transient(_)) => "transient_error",
            Err(ProviderError::Fatal(_)) => "fatal_error",
        };
        metrics::record_provider_operation(
            self.kind,
            self.operation,
            outcome,
            self.start.elapsed().as_secs_f64(),
        );
        result
    }
}
