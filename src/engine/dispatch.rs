// src/engine/dispatch.rs

//! Routing parsed commands to their handlers.
//!
//! The channel never calls an executor directly. It hands the request to
//! the [`Dispatcher`], which looks up the handler registered for the
//! command type and turns whatever happens into a [`CommandResponse`].
//! Tests register fake handlers to drive the channel without real work.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::ipc::events::{AgentEvent, EventSink};
use crate::ipc::protocol::{CommandRequest, CommandResponse};
use crate::types::CommandType;

pub type HandlerFuture<'a> =
    Pin<Box<dyn Future<Output = anyhow::Result<CommandResponse>> + Send + 'a>>;

/// Performs the work for one command type.
///
/// An `Err` is not fatal: the dispatcher converts it into a failure
/// response so the producer still gets an answer.
pub trait CommandHandler: Send + Sync {
    fn handle<'a>(
        &'a self,
        request: &'a CommandRequest,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a>;
}

pub struct Dispatcher {
    handlers: HashMap<CommandType, Arc<dyn CommandHandler>>,
    events: Arc<dyn EventSink>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().map(|k| k.as_str()).collect();
        kinds.sort();
        f.debug_struct("Dispatcher")
            .field("handlers", &kinds)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self {
            handlers: HashMap::new(),
            events,
        }
    }

    /// Register (or replace) the handler for `kind`.
    pub fn register(mut self, kind: CommandType, handler: Arc<dyn CommandHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Run the handler for `request`.
    ///
    /// Returns `None` when no handler is registered for the type; the
    /// command is then left for a later build of the agent that knows it.
    pub async fn dispatch(
        &self,
        request: &CommandRequest,
        cancel: &CancellationToken,
    ) -> Option<CommandResponse> {
        let handler = self.handlers.get(&request.kind)?;
        debug!(id = %request.id, kind = %request.kind, "dispatching command");

        match handler.handle(request, cancel).await {
            Ok(response) => Some(response),
            Err(err) => {
                let message = format!("{err:#}");
                error!(id = %request.id, kind = %request.kind, error = %message, "command handler failed");
                self.events
                    .publish(AgentEvent::error("Command execution error", &message));
                Some(CommandResponse::failure(request.kind, message))
            }
        }
    }
}
