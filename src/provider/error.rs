//! Provider error taxonomy.

use thiserror::Error;

/// Classified failure of a cloud API call
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The addressed remote resource does not exist
    #[error("remote resource not found: {0}")]
    NotFound(String),
    /// Worth retrying: network, throttling, provider-side failures
    #[error("transient provider failure: {0:#}")]
    Transient(anyhow::Error),
    /// Retrying cannot help until something changes: bad input, permission denial
    #[error("fatal provider failure: {0:#}")]
    Fatal(anyhow::Error),
}

/// Error codes that mean "the resource is not there"
const NOT_FOUND_CODES: &[&str] = &[
    "NotFound",
    "NoSuchBucket",
    "QueueDoesNotExist",
    "AWS.SimpleQueueService.NonExistentQueue",
    "NonExistentQueue",
];

/// Error codes that will not go away by retrying
const FATAL_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "InvalidClientTokenId",
    "InvalidBucketName",
    "InvalidArgument",
    "InvalidParameterValue",
    "InvalidAttributeName",
    "InvalidAttributeValue",
    "BucketAlreadyExists",
    "BucketNotEmpty",
    "QueueNameExists",
    "ValidationError",
    "MalformedXML",
];

/// Coarse class of a provider error code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorClass {
    NotFound,
    Transient,
    Fatal,
}

pub(crate) fn classify_error_code(code: Option<&str>) -> ErrorClass {
    match code {
        Some(code) if NOT_FOUND_CODES.contains(&code) => ErrorClass::NotFound,
        Some(code) if FATAL_CODES.contains(&code) => ErrorClass::Fatal,
        _ => ErrorClass::Transient,
    }
}

pub(crate) fn classify_http_status(status: reqwest::StatusCode) -> ErrorClass {
    match status.as_u16() {
        404 => ErrorClass::NotFound,
        400 | 401 | 403 | 422 => ErrorClass::Fatal,
        _ => ErrorClass::Transient,
    }
}

impl ProviderError {
    pub(crate) fn from_class(class: ErrorClass, subject: &str, source: anyhow::Error) -> Self {
        match class {
            ErrorClass::NotFound => Self::NotFound(subject.to_string()),
            ErrorClass::Transient => Self::Transient(source),
            ErrorClass::Fatal => Self::Fatal(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_classify_error_code() {
        assert_eq!(classify_error_code(Some("NoSuchBucket")), ErrorClass::NotFound);
        assert_eq!(
            classify_error_code(Some("AWS.SimpleQueueService.NonExistentQueue")),
            ErrorClass::NotFound
        );
        assert_eq!(classify_error_code(Some("AccessDenied")), ErrorClass::Fatal);
        assert_eq!(classify_error_code(Some("BucketNotEmpty")), ErrorClass::Fatal);
        assert_eq!(classify_error_code(Some("SlowDown")), ErrorClass::Transient);
        assert_eq!(classify_error_code(Some("InternalError")), ErrorClass::Transient);
        assert_eq!(classify_error_code(None), ErrorClass::Transient);
    }

    #[test]
    fn test_classify_http_status() {
        assert_eq!(classify_http_status(StatusCode::NOT_FOUND), ErrorClass::NotFound);
        assert_eq!(classify_http_status(StatusCode::FORBIDDEN), ErrorClass::Fatal);
        assert_eq!(classify_http_status(StatusCode::BAD_REQUEST), ErrorClass::Fatal);
        assert_eq!(
            classify_http_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorClass::Transient
        );
        assert_eq!(
            classify_http_status(StatusCode::SERVICE_UNAVAILABLE),
            ErrorClass::Transient
        );
        assert_eq!(classify_http_status(StatusCode::CONFLICT), ErrorClass::Transient);
    }

    #[test]
    fn test_display_includes_context_chain() {
        let err = ProviderError::Transient(
            anyhow::anyhow!("connection reset").context("listing queues"),
        );
        assert_eq!(
            err.to_string(),
            "transient provider failure: listing queues: connection reset"
        );
    }
}
