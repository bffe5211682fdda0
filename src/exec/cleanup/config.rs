// src/exec/cleanup/config.rs

//! Cleanup targets document (`cleanup_targets.json`).
//!
//! ```json
//! {
//!   "groups": [
//!     { "name": "windows_temp", "paths": ["%TEMP%\\*", "%WINDIR%\\Temp\\*"] },
//!     { "name": "thumbnails", "paths": ["%LOCALAPPDATA%\\Microsoft\\Windows\\Explorer\\thumbcache_*.db"] }
//!   ],
//!   "exclusions": ["%TEMP%\\keep\\*"]
//! }
//! ```
//!
//! Property names are matched case-insensitively. A missing document is not
//! an error: it yields an empty config and cleanup becomes a no-op.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::fs::FileSystem;
use crate::tolerant::fold_keys;

/// File name looked up in every candidate location.
pub const TARGETS_FILE: &str = "cleanup_targets.json";

/// Development-relative directory checked before the data root.
pub const DEV_DATA_DIR: &str = "data";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CleanupConfig {
    #[serde(default)]
    pub groups: Vec<CleanupGroup>,

    #[serde(default)]
    pub exclusions: Vec<String>,
}

/// A named set of path patterns cleaned together.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CleanupGroup {
    pub name: String,

    #[serde(default)]
    pub paths: Vec<String>,
}

impl CleanupConfig {
    pub fn from_json(contents: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(contents).context("parsing cleanup targets")?;
        let config = serde_json::from_value(fold_keys(value))
            .context("cleanup targets do not match the expected shape")?;
        Ok(config)
    }

    /// Load from the first candidate that exists.
    ///
    /// Returns the empty config when none exists.
    pub fn load(fs: &dyn FileSystem, candidates: &[PathBuf]) -> Result<(Self, Option<PathBuf>)> {
        let Some(path) = locate(fs, candidates) else {
            debug!(?candidates, "no cleanup targets file found; nothing to clean");
            return Ok((Self::default(), None));
        };

        let contents = fs.read_to_string(&path)?;
        let config = Self::from_json(&contents)
            .with_context(|| format!("loading cleanup targets from {:?}", path))?;
        debug!(path = ?path, groups = config.groups.len(), "loaded cleanup targets");
        Ok((config, Some(path)))
    }

    /// Groups selected by `requested`, in config order.
    ///
    /// An empty or absent selection means every group; requested names that
    /// match no group are dropped.
    pub fn select(&self, requested: Option<&[String]>) -> Vec<&CleanupGroup> {
        match requested {
            Some(names) if !names.is_empty() => self
                .groups
                .iter()
                .filter(|g| names.iter().any(|n| n.eq_ignore_ascii_case(&g.name)))
                .collect(),
            _ => self.groups.iter().collect(),
        }
    }
}

/// Candidate locations, most specific first:
/// 1. an explicitly configured path,
/// 2. `data/cleanup_targets.json` relative to the working directory,
/// 3. `<data_root>/cleanup_targets.json`.
pub fn target_candidates(explicit: Option<&Path>, data_root: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(3);
    if let Some(p) = explicit {
        candidates.push(p.to_path_buf());
    }
    candidates.push(PathBuf::from(DEV_DATA_DIR).join(TARGETS_FILE));
    candidates.push(data_root.join(TARGETS_FILE));
    candidates
}

fn locate(fs: &dyn FileSystem, candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| fs.is_file(p)).cloned()
}
