//! # Spec Validation
//!
//! Name rules enforced before anything is created remotely. A spec that fails
//! here can never succeed, so callers treat violations as fatal.

use regex::Regex;
use std::sync::LazyLock;

static REGISTRY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]([-a-z0-9]{0,61}[a-z0-9])?$")
        .expect("Failed to compile REGISTRY_NAME regex - this should never happen")
});

static QUEUE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{1,80}$")
        .expect("Failed to compile QUEUE_NAME regex - this should never happen")
});

static BUCKET_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$")
        .expect("Failed to compile BUCKET_NAME regex - this should never happen")
});

static IPV4_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$")
        .expect("Failed to compile IPV4_LIKE regex - this should never happen")
});

pub(crate) const FIFO_SUFFIX: &str = ".fifo";

/// Queue name limit, `.fifo` suffix included
const MAX_QUEUE_NAME_LEN: usize = 80;

/// Canned ACLs accepted by Object Storage
pub(crate) const BUCKET_ACLS: &[&str] = &[
    "private",
    "public-read",
    "public-read-write",
    "authenticated-read",
];

pub(crate) fn validate_registry_name(name: &str) -> Result<(), String> {
    if REGISTRY_NAME.is_match(name) {
        Ok(())
    } else {
        Err(format!(
            "registry name '{name}' must be 1-63 lowercase letters, digits or hyphens, start with a letter and not end with a hyphen"
        ))
    }
}

pub(crate) fn validate_queue_name(name: &str, fifo: bool) -> Result<(), String> {
    if name.len() > MAX_QUEUE_NAME_LEN {
        return Err(format!(
            "queue name '{name}' is longer than {MAX_QUEUE_NAME_LEN} characters"
        ));
    }
    let base = match (name.strip_suffix(FIFO_SUFFIX), fifo) {
        (Some(base), true) => base,
        (None, false) => name,
        (Some(_), false) => {
            return Err(format!(
                "queue name '{name}' ends with '{FIFO_SUFFIX}' but fifoQueue is false"
            ))
        }
        (None, true) => {
            return Err(format!(
                "FIFO queue name '{name}' must end with '{FIFO_SUFFIX}'"
            ))
        }
    };
    if QUEUE_NAME.is_match(base) {
        Ok(())
    } else {
        Err(format!(
            "queue name '{name}' must be 1-80 letters, digits, hyphens or underscores"
        ))
    }
}

pub(crate) fn validate_bucket_name(name: &str) -> Result<(), String> {
    if !BUCKET_NAME.is_match(name) {
        return Err(format!(
            "bucket name '{name}' must be 3-63 lowercase letters, digits, dots or hyphens and start and end with a letter or digit"
        ));
    }
    if name.contains("..") || name.contains(".-") || name.contains("-.") {
        return Err(format!(
            "bucket name '{name}' must not contain adjacent dots or dots next to hyphens"
        ));
    }
    if IPV4_LIKE.is_match(name) {
        return Err(format!("bucket name '{name}' must not look like an IP address"));
    }
    Ok(())
}

pub(crate) fn validate_bucket_acl(acl: &str) -> Result<(), String> {
    if BUCKET_ACLS.contains(&acl) {
        Ok(())
    } else {
        Err(format!(
            "unsupported bucket ACL '{acl}', expected one of {}",
            BUCKET_ACLS.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names() {
        assert!(validate_registry_name("my-registry").is_ok());
        assert!(validate_registry_name("r").is_ok());
        assert!(validate_registry_name("My-Registry").is_err());
        assert!(validate_registry_name("1registry").is_err());
        assert!(validate_registry_name("registry-").is_err());
        assert!(validate_registry_name("").is_err());
    }

    #[test]
    fn test_queue_names_respect_fifo_suffix() {
        assert!(validate_queue_name("orders", false).is_ok());
        assert!(validate_queue_name("orders.fifo", true).is_ok());
        assert!(validate_queue_name("orders", true).is_err());
        assert!(validate_queue_name("orders.fifo", false).is_err());
        assert!(validate_queue_name("bad name", false).is_err());
        assert!(validate_queue_name(&"q".repeat(81), false).is_err());
    }

    #[test]
    fn test_fifo_suffix_counts_towards_length() {
        assert!(validate_queue_name(&format!("{}.fifo", "a".repeat(75)), true).is_ok());
        let err = validate_queue_name(&format!("{}.fifo", "a".repeat(76)), true)
            .expect_err("81 characters with suffix");
        assert!(err.contains("longer than 80"));
        assert!(validate_queue_name(&format!("{}.fifo", "a".repeat(80)), true).is_err());
    }

    #[test]
    fn test_bucket_names() {
        assert!(validate_bucket_name("my-bucket.assets").is_ok());
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name("Bucket").is_err());
        assert!(validate_bucket_name("my..bucket").is_err());
        assert!(validate_bucket_name("my.-bucket").is_err());
        assert!(validate_bucket_name("192.168.0.1").is_err());
    }

    #[test]
    fn test_bucket_acls() {
        assert!(validate_bucket_acl("private").is_ok());
        assert!(validate_bucket_acl("public-read").is_ok());
        assert!(validate_bucket_acl("everyone").is_err());
    }
}
