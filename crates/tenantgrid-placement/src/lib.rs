//! TenantGrid placement — decides where each tenant's workloads live.
//!
//! Given a tenant's tier, this crate resolves the placement mode, sizing, and
//! isolation requirements, then derives the namespace the tenant occupies.
//! It produces values only; nothing here touches the cluster.
//!
//! # Components
//!
//! - **`policy`** — Tier decision table (placement, sizing, isolation, event bus)
//! - **`namespace`** — Deterministic namespace allocation with collision checks

pub mod namespace;
pub mod policy;

pub use namespace::{NamespaceAllocator, namespace_name};
pub use policy::{IsolationRequirement, PlacementRule, SizingProfile, TierPolicy, TierResolution};
