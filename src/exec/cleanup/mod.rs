// src/exec/cleanup/mod.rs

//! Filesystem cleanup engine.
//!
//! - [`config`] loads the named pattern groups and exclusions.
//! - [`model`] holds the request / report types.
//! - [`executor`] resolves patterns and deletes (or simulates deleting).

pub mod config;
pub mod executor;
pub mod model;

pub use config::{target_candidates, CleanupConfig, CleanupGroup, TARGETS_FILE};
pub use executor::CleanupExecutor;
pub use model::{CleanupReport, CleanupRequest};
