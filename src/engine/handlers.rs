// src/engine/handlers.rs

//! Handlers wiring command types to the executors.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::engine::dispatch::{CommandHandler, HandlerFuture};
use crate::exec::cleanup::{CleanupExecutor, CleanupRequest};
use crate::exec::update::{UpdateExecutor, UpdateRequest};
use crate::ipc::events::{AgentEvent, EventSink};
use crate::ipc::protocol::{CommandRequest, CommandResponse};

/// `Clean` / `CleanAll`.
///
/// Cleanup is synchronous filesystem work, so it runs on the blocking pool;
/// the cancellation token is still checked between patterns.
#[derive(Debug)]
pub struct CleanHandler {
    executor: Arc<CleanupExecutor>,
    events: Arc<dyn EventSink>,
}

impl CleanHandler {
    pub fn new(executor: Arc<CleanupExecutor>, events: Arc<dyn EventSink>) -> Self {
        Self { executor, events }
    }
}

impl CommandHandler for CleanHandler {
    fn handle<'a>(
        &'a self,
        request: &'a CommandRequest,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let mut cleanup = CleanupRequest {
                groups: request.options.groups.clone(),
                simulate: request.options.simulate,
                ..CleanupRequest::default()
            };
            if let Some(level) = &request.options.level {
                cleanup.level = level.clone();
            }
            let simulated = self.executor.is_simulating(&cleanup);

            self.events
                .publish(AgentEvent::cleanup_started(&cleanup_scope(&cleanup, simulated)));

            let executor = Arc::clone(&self.executor);
            let token = cancel.clone();
            let job = cleanup.clone();
            let report = tokio::task::spawn_blocking(move || executor.run(&job, &token))
                .await
                .context("cleanup task aborted")?;

            info!(
                id = %request.id,
                files = report.files_deleted,
                bytes = report.bytes_freed,
                groups = report.groups_done.len(),
                errors = report.errors.len(),
                simulated,
                "cleanup finished"
            );
            self.events
                .publish(AgentEvent::cleanup_finished(report.files_deleted, report.bytes_freed));

            Ok(CommandResponse {
                success: report.errors.is_empty(),
                kind: request.kind.to_string(),
                message: report.summary(simulated),
            })
        })
    }
}

fn cleanup_scope(request: &CleanupRequest, simulated: bool) -> String {
    let groups = match &request.groups {
        Some(groups) if !groups.is_empty() => groups.join(", "),
        _ => "all groups".to_string(),
    };
    let mut scope = format!("{}, {groups}", request.level);
    if simulated {
        scope.push_str(", simulation");
    }
    scope
}

/// `UpdateAll` / `Update`.
#[derive(Debug)]
pub struct UpdateHandler {
    executor: Arc<UpdateExecutor>,
    events: Arc<dyn EventSink>,
}

impl UpdateHandler {
    pub fn new(executor: Arc<UpdateExecutor>, events: Arc<dyn EventSink>) -> Self {
        Self { executor, events }
    }
}

impl CommandHandler for UpdateHandler {
    fn handle<'a>(
        &'a self,
        request: &'a CommandRequest,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let update = UpdateRequest {
                sources: request.options.sources.clone(),
            };
            let sources = match &update.sources {
                Some(s) if !s.is_empty() => s.join(", "),
                _ => "all sources".to_string(),
            };
            self.events.publish(AgentEvent::update_started(&sources));

            let report = self.executor.run(&update, cancel).await;

            info!(
                id = %request.id,
                items = report.items_updated,
                sources = ?report.sources_done,
                errors = report.errors.len(),
                "update finished"
            );
            self.events
                .publish(AgentEvent::update_finished(report.items_updated));

            Ok(CommandResponse {
                success: report.errors.is_empty(),
                kind: request.kind.to_string(),
                message: report.summary(),
            })
        })
    }
}
