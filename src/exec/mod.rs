// src/exec/mod.rs

//! Executors for the work a command can request.
//!
//! - [`process`] runs external programs with a timeout and process-tree
//!   termination.
//! - [`cleanup`] deletes files matched by configured pattern groups.
//! - [`update`] drives the fixed update pipeline through [`process`].
//! - [`env_expand`] expands environment references in configured paths.

pub mod cleanup;
pub mod env_expand;
pub mod process;
pub mod update;

pub use cleanup::{CleanupExecutor, CleanupReport, CleanupRequest};
pub use process::{ProcessError, ProcessOutput, ProcessRunner, TokioProcessRunner};
pub use update::{UpdateExecutor, UpdateReport, UpdateRequest};
