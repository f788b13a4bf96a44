//! Client event handlers.
//!
//! This module contains the Handler trait and event registry for dispatching
//! decoded frames from Active connections to the appropriate handler.

mod core;
mod messaging;
mod room;
mod typing;

pub use self::core::{Context, Handler, Registry};
pub use crate::error::{HandlerError, HandlerResult};
