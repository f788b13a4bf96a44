//! Core handler infrastructure.

pub mod context;
pub mod registry;

pub use context::{Context, Handler};
pub use registry::Registry;
