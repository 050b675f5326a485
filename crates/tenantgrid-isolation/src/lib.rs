//! TenantGrid isolation — data access and event delivery boundaries.
//!
//! # Components
//!
//! - **`stores`** — Where a store lives for a namespace and who shares it
//! - **`identity`** — Service accounts and tag-conditioned access grants
//! - **`events`** — Tenant- and tier-scoped event subscriptions, plus audit watchers

pub mod events;
pub mod identity;
pub mod stores;

pub use events::{
    BusEvent, EventFilter, EventFilterComposer, EventSubscription, SubscriptionKind,
    SubscriptionTarget,
};
pub use identity::{
    AccessGrant, Binding, GrantCondition, IdentityBinder, ServiceIdentity, TrustStatement,
};
pub use stores::{StoreRef, resolve_store};
