//! Identifier rules for derived resource names.
//!
//! Names are validated, never truncated: a truncated tenant id could collide
//! with another tenant's namespace or a pool name.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{TenantError, TenantResult};

/// Orchestrator limit for namespace, service account, and object names.
pub const MAX_NAME_LEN: usize = 63;

static DNS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid DNS-1123 label pattern")
});

/// Validate a name that must be a DNS-1123 label (namespaces, service
/// accounts, workloads, route names).
pub fn validate_label(kind: &str, name: &str) -> TenantResult<()> {
    check_length(kind, name, MAX_NAME_LEN)?;
    if !DNS_LABEL.is_match(name) {
        return Err(TenantError::InvalidName {
            kind: kind.to_string(),
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Validate only the length of a name with a substrate-specific limit.
pub fn check_length(kind: &str, name: &str, limit: usize) -> TenantResult<()> {
    let len = name.chars().count();
    if len > limit {
        return Err(TenantError::NameTooLong {
            kind: kind.to_string(),
            name: name.to_string(),
            len,
            limit,
        });
    }
    Ok(())
}

/// In-cluster DNS name of a service's front door.
pub fn service_host(service: &str, namespace: &str) -> String {
    format!("{service}-service.{namespace}.svc.cluster.local")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dns_labels() {
        assert!(validate_label("namespace", "basic-pool").is_ok());
        assert!(validate_label("namespace", "tenant-b").is_ok());
        assert!(validate_label("namespace", "a").is_ok());
    }

    #[test]
    fn rejects_malformed_labels() {
        for bad in ["Tenant-B", "-tenant", "tenant-", "tenant_b", "tenant.b", ""] {
            let err = validate_label("namespace", bad).unwrap_err();
            assert!(matches!(err, TenantError::InvalidName { .. }), "{bad}");
        }
    }

    #[test]
    fn over_length_is_an_error_not_a_truncation() {
        let name = "t".repeat(64);
        let err = validate_label("namespace", &name).unwrap_err();
        assert_eq!(
            err,
            TenantError::NameTooLong {
                kind: "namespace".to_string(),
                name,
                len: 64,
                limit: MAX_NAME_LEN,
            }
        );
        assert!(validate_label("namespace", &"t".repeat(63)).is_ok());
    }

    #[test]
    fn service_host_is_namespace_qualified() {
        assert_eq!(
            service_host("order", "tenant-b"),
            "order-service.tenant-b.svc.cluster.local"
        );
    }
}
