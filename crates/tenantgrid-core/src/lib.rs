//! TenantGrid core — the vocabulary every other crate composes with.
//!
//! # Components
//!
//! - **`types`** — Tiers, tenants, roster entries, namespaces, sizing values
//! - **`config`** — `tenantgrid.toml` parsing and scaffolding
//! - **`catalog`** — The services and data stores deployed per namespace
//! - **`naming`** — DNS-1123 label rules for derived names
//! - **`error`** — Per-tenant and run-wide error taxonomy

pub mod catalog;
pub mod config;
pub mod error;
pub mod naming;
pub mod types;

pub use catalog::ServiceCatalog;
pub use config::TenantGridConfig;
pub use error::{ComposeError, ComposeResult, DeriveError, DeriveResult, TenantError, TenantResult};
pub use types::*;
