//! Error taxonomy for composition.
//!
//! Errors come in two scopes:
//! - [`TenantError`] rejects a single roster entry; the rest of the roster still composes.
//! - [`ComposeError`] signals systemic misconfiguration and aborts the whole run.
//!
//! [`DeriveError`] carries either one out of steps that can fail both ways.

use serde::Serialize;
use thiserror::Error;

use crate::types::Tier;

/// Result type alias for per-tenant derivations.
pub type TenantResult<T> = Result<T, TenantError>;

/// Result type alias for run-wide composition steps.
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Errors that reject one roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum TenantError {
    #[error("unsupported tier: {tier:?}")]
    UnsupportedTier { tier: String },

    #[error("{kind} name {name:?} is {len} characters, limit is {limit}")]
    NameTooLong {
        kind: String,
        name: String,
        len: usize,
        limit: usize,
    },

    #[error("{kind} name {name:?} is not a valid DNS-1123 label")]
    InvalidName { kind: String, name: String },

    #[error("tier {tier} places every tenant in its own namespace and requires a tenant id")]
    MissingTenantId { tier: Tier },

    #[error("namespace {namespace:?} is already allocated to {claimed_by}")]
    NamespaceCollision { namespace: String, claimed_by: String },
}

/// Errors that abort composition for the entire roster.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ComposeError {
    #[error("service {service:?} accesses shared store {store:?} without a tenant scoping mechanism: {reason}")]
    MissingIsolationBinding {
        service: String,
        store: String,
        reason: String,
    },

    #[error("service dependency cycle: {}", cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("service {service:?} references undeclared {dependency:?}")]
    UnknownDependency { service: String, dependency: String },

    #[error(
        "route {path_prefix:?} with predicate {predicate} points at both {existing} and {conflicting}"
    )]
    RoutingConflict {
        path_prefix: String,
        predicate: String,
        existing: String,
        conflicting: String,
    },

    #[error("conflicting definitions for resource {key}")]
    NodeConflict { key: String },

    #[error("tier {tier} cannot place service {service:?}: {reason}")]
    InvalidPlacement {
        tier: Tier,
        service: String,
        reason: String,
    },
}

/// Failure of a derivation step that can hit either scope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeriveError {
    #[error(transparent)]
    Tenant(#[from] TenantError),

    #[error(transparent)]
    Abort(#[from] ComposeError),
}

/// Result type alias for derivations that can fail per tenant or run-wide.
pub type DeriveResult<T> = Result<T, DeriveError>;

impl ComposeError {
    /// Short machine-readable kind, used in logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            ComposeError::MissingIsolationBinding { .. } => "missing_isolation_binding",
            ComposeError::DependencyCycle { .. } => "dependency_cycle",
            ComposeError::UnknownDependency { .. } => "unknown_dependency",
            ComposeError::RoutingConflict { .. } => "routing_conflict",
            ComposeError::NodeConflict { .. } => "node_conflict",
            ComposeError::InvalidPlacement { .. } => "invalid_placement",
        }
    }
}
