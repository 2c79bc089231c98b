//! Tunnel Sync desired-state model
//!
//! Plain value types describing what should exist remotely, derived from
//! container labels on every sync pass:
//! - [`RouteSpec`]: one hostname/path route through the tunnel
//! - [`AccessAppSpec`] / [`AccessPolicySpec`]: Access applications and their policies
//! - [`OwnershipMarker`]: the tag/comment that proves a remote object belongs to us
//!
//! Nothing here talks to the network. Every reconciler consumes these types.

pub mod access;
pub mod ownership;
pub mod route;

pub use access::*;
pub use ownership::*;
pub use route::*;
