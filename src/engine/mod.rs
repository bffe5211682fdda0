// src/engine/mod.rs

//! Command execution engine.
//!
//! - [`dispatch`] maps command types to [`dispatch::CommandHandler`]s and
//!   turns handler failures into failure responses.
//! - [`handlers`] adapts the cleanup and update executors to that trait and
//!   reports progress events.
//! - [`runtime`] is the polling loop that drives the command channel.

pub mod dispatch;
pub mod handlers;
pub mod runtime;

pub use dispatch::{CommandHandler, Dispatcher, HandlerFuture};
pub use handlers::{CleanHandler, UpdateHandler};
pub use runtime::{AgentRuntime, RuntimeOptions};
