// src/config/validate.rs

use crate::config::model::{AgentConfig, RawAgentConfig};
use crate::errors::{AgentError, Result};

impl TryFrom<RawAgentConfig> for AgentConfig {
    type Error = crate::errors::AgentError;

    fn try_from(raw: RawAgentConfig) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(AgentConfig::new_unchecked(raw.agent, raw.cleanup, raw.update))
    }
}

/// Check the invariants the runtime relies on.
pub fn validate_config(cfg: &RawAgentConfig) -> Result<()> {
    validate_agent_section(cfg)?;
    validate_update_steps(cfg)?;
    Ok(())
}

fn validate_agent_section(cfg: &RawAgentConfig) -> Result<()> {
    if cfg.agent.poll_interval_ms == 0 {
        return Err(AgentError::ConfigError(
            "[agent].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.agent.quarantine_after == Some(0) {
        return Err(AgentError::ConfigError(
            "[agent].quarantine_after must be >= 1 when set (got 0)".to_string(),
        ));
    }

    if let Some(root) = &cfg.agent.data_root {
        if root.as_os_str().is_empty() {
            return Err(AgentError::ConfigError(
                "[agent].data_root must not be empty".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_update_steps(cfg: &RawAgentConfig) -> Result<()> {
    for (key, step) in cfg.update.steps() {
        if step.program.trim().is_empty() {
            return Err(AgentError::ConfigError(format!(
                "[update.{key}].program must not be empty"
            )));
        }
        if step.timeout_secs == 0 {
            return Err(AgentError::ConfigError(format!(
                "[update.{key}].timeout_secs must be >= 1 (got 0)"
            )));
        }
    }
    Ok(())
}
