// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Kind of work a command file asks the agent to perform.
///
/// The wire format is lenient: producers send either a name (several
/// historical aliases are accepted, case-insensitively) or the numeric value.
///
/// - `Clean` (`0`): aliases `Clean`, `CleanAll`.
/// - `UpdateAll` (`1`): aliases `UpdateAll`, `Update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    Clean,
    UpdateAll,
}

impl CommandType {
    /// Canonical name, used as `Kind` in result files.
    pub fn as_str(self) -> &'static str {
        match self {
            CommandType::Clean => "Clean",
            CommandType::UpdateAll => "UpdateAll",
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(CommandType::Clean),
            1 => Some(CommandType::UpdateAll),
            _ => None,
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return CommandType::from_code(code)
                .ok_or_else(|| format!("unknown command type code: {code}"));
        }

        match trimmed.to_lowercase().as_str() {
            "clean" | "cleanall" => Ok(CommandType::Clean),
            "updateall" | "update" => Ok(CommandType::UpdateAll),
            other => Err(format!(
                "invalid command type: {other} (expected \"Clean\", \"CleanAll\", \"UpdateAll\", \"Update\", 0 or 1)"
            )),
        }
    }
}

impl Serialize for CommandType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
