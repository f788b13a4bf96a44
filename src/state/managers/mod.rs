//! Domain managers for server state.
//!
//! Each manager owns one table of shared state and exposes only the
//! operations that keep its invariants. The [`Matrix`](super::Matrix) wires
//! them together.

pub mod presence;
pub mod room;
pub mod session;
pub mod typing;
