// src/config/mod.rs

//! Configuration loading and validation for hostcare.
//!
//! Responsibilities:
//! - Define the TOML-backed agent config model (`model.rs`).
//! - Load a config file from disk, falling back to defaults (`loader.rs`).
//! - Validate basic invariants like non-zero intervals (`validate.rs`).
//!
//! The cleanup target list is a separate JSON document owned by the
//! front-end; it lives with the cleanup executor in
//! [`crate::exec::cleanup::config`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_data_root, load_and_validate, load_from_path, load_or_default};
pub use model::{
    AgentConfig, AgentSection, CleanupSection, RawAgentConfig, StepCommand, UpdateSection,
};
pub use validate::validate_config;
