//! TenantGrid mesh routing — binds service paths to tenant backends.
//!
//! Rules match on the tier and tenant claims of an already-verified token
//! plus a URL path prefix. Token verification itself happens in the mesh.
//!
//! # Components
//!
//! - **`route`** — Claim predicates, destinations, and the routing composer
//! - **`table`** — Per-prefix route tables with first-match ordering

pub mod route;
pub mod table;

pub use route::{Claims, ClaimPredicate, Destination, RoutePrecedence, RoutingComposer, RoutingRule};
pub use table::RouteTable;
