// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{AgentConfig, RawAgentConfig};
use crate::errors::Result;

/// Directory name appended to the platform data directory.
const APP_DIR: &str = "hostcare";

/// Load an agent configuration file from a given path and return the raw
/// `RawAgentConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawAgentConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawAgentConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load an agent configuration file and run validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<AgentConfig> {
    let raw_config = load_from_path(&path)?;
    let config = AgentConfig::try_from(raw_config)?;
    Ok(config)
}

/// Load the config at `path` if one was given, otherwise use defaults.
///
/// A path that was explicitly requested but cannot be read is an error; the
/// agent never silently ignores a config the operator pointed it at.
pub fn load_or_default(path: Option<&Path>) -> Result<AgentConfig> {
    match path {
        Some(p) => load_and_validate(p),
        None => {
            debug!("no config file given; using built-in defaults");
            AgentConfig::try_from(RawAgentConfig::default())
        }
    }
}

/// Default application data root.
///
/// - Windows: `%ProgramData%\hostcare` (machine-wide, like a service would
///   expect).
/// - elsewhere: the per-user data directory, e.g. `~/.local/share/hostcare`.
/// - If neither can be resolved, `./hostcare-data`.
pub fn default_data_root() -> PathBuf {
    if cfg!(windows) {
        if let Some(program_data) = std::env::var_os("ProgramData") {
            return PathBuf::from(program_data).join(APP_DIR);
        }
    }

    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("hostcare-data"))
}
