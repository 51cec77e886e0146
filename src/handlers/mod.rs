//! # Handlers and their arguments.
//!
//! This module provides the handler-related types:
//! - [`Value`] / [`Args`] - opaque positional arguments carried by a publish call
//! - [`FromArg`] - typed extraction of one argument
//! - [`Handler`] - shared, type-erased callable stored per channel
//! - [`IntoHandler`] / [`HandlerOutput`] - adapters turning typed closures into handlers

mod handler;
mod value;

pub use handler::{CallError, Erased, Handler, HandlerOutput, IntoHandler};
pub use value::{Args, FromArg, Value};
