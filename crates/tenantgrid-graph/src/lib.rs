//! TenantGrid deployment graph — turns a tenant roster into an ordered set
//! of resources an executor can apply.
//!
//! # Components
//!
//! - **`node`** — Node keys and resource definitions
//! - **`graph`** — The deployment graph: waves, cycle checks, fingerprints
//! - **`builder`** — Per-tenant plans merged with deduplication
//! - **`composer`** — Roster composition with per-tenant rejection and run-wide abort
//! - **`diff`** — Added, removed, and changed nodes between two graphs
//! - **`executor`** — Executor trait and the dry-run executor

pub mod builder;
pub mod composer;
pub mod diff;
pub mod executor;
pub mod graph;
pub mod node;

pub use builder::{DependencyGraphBuilder, TenantPlan, check_service_cycles};
pub use composer::{
    ApplicationComposer, Composition, CompositionAborted, Rejection, compose, compose_subset,
};
pub use diff::GraphDiff;
pub use executor::{ApplyReport, DryRunExecutor, NodeOutcome, ResourceGraphExecutor, apply_in_waves};
pub use graph::DeploymentGraph;
pub use node::{NamespacePolicy, NodeKey, NodeSpec, PolicyFilter, ResourceKind, Workload};
