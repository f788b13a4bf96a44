//! State management module.
//!
//! Contains the Matrix (shared server state), the per-connection handle and
//! the domain managers the Matrix is built from.

mod connection;
mod dashmap_ext;
pub mod managers;
mod matrix;
mod uid;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{ConnectionHandle, DeliveryError};
pub use dashmap_ext::DashMapExt;
pub use managers::presence::Presence;
pub use matrix::{Matrix, MatrixConfig};
pub use uid::{ConnId, ConnIdGenerator};
