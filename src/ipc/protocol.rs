// src/ipc/protocol.rs

//! Command and result file bodies.
//!
//! Command files come from a front-end we do not control, so parsing is
//! deliberately lenient in two ways, and strict everywhere else:
//! - property names are matched case-insensitively;
//! - the command type may be a name (with aliases) or its numeric value.
//!
//! Anything outside that is rejected with a [`ParseError`] rather than
//! coerced.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::tolerant::get_ci;
use crate::types::CommandType;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("body must be a JSON object")]
    NotAnObject,

    #[error("missing `Type` property")]
    MissingType,

    #[error("unsupported command type {0}")]
    InvalidType(String),

    #[error("property `{field}` must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

/// Optional payload fields refining what a command does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
    pub level: Option<String>,
    pub groups: Option<Vec<String>>,
    pub simulate: bool,
    pub sources: Option<Vec<String>>,
}

/// A parsed command file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub id: String,
    pub kind: CommandType,
    pub options: CommandOptions,
}

/// Result file body: `{"Success":true,"Kind":"Clean","Message":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommandResponse {
    pub success: bool,
    pub kind: String,
    pub message: String,
}

impl CommandResponse {
    pub fn success(kind: CommandType, message: impl Into<String>) -> Self {
        Self {
            success: true,
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn failure(kind: CommandType, message: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Parse a command body.
///
/// `identity` is the already-resolved identity of the file; it is used as
/// the request id when the payload carries none.
pub fn parse_command(body: &str, identity: &str) -> Result<CommandRequest, ParseError> {
    let value: Value = serde_json::from_str(body)?;
    let Value::Object(object) = value else {
        return Err(ParseError::NotAnObject);
    };

    let id = match get_ci(&object, "id") {
        None | Some(Value::Null) => identity.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => identity.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(ParseError::InvalidField {
                field: "Id",
                expected: "a string",
            });
        }
    };

    let kind = parse_type(get_ci(&object, "type").ok_or(ParseError::MissingType)?)?;
    let options = parse_options(&object)?;

    Ok(CommandRequest { id, kind, options })
}

/// Accept `"CleanAll"`, `"clean"`, `"1"`, `1`, ...
pub fn parse_type(value: &Value) -> Result<CommandType, ParseError> {
    match value {
        Value::String(s) => s.parse().map_err(|_| ParseError::InvalidType(format!("{s:?}"))),
        Value::Number(n) => n
            .as_i64()
            .and_then(CommandType::from_code)
            .ok_or_else(|| ParseError::InvalidType(n.to_string())),
        other => Err(ParseError::InvalidType(other.to_string())),
    }
}

fn parse_options(object: &Map<String, Value>) -> Result<CommandOptions, ParseError> {
    let level = match get_ci(object, "level") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(ParseError::InvalidField {
                field: "Level",
                expected: "a string",
            });
        }
    };

    let simulate = match get_ci(object, "simulate").or_else(|| get_ci(object, "simulation")) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            return Err(ParseError::InvalidField {
                field: "Simulate",
                expected: "a boolean",
            });
        }
    };

    Ok(CommandOptions {
        level,
        groups: string_list(object, "groups", "Groups")?,
        simulate,
        sources: string_list(object, "sources", "Sources")?,
    })
}

fn string_list(
    object: &Map<String, Value>,
    key: &str,
    field: &'static str,
) -> Result<Option<Vec<String>>, ParseError> {
    let invalid = ParseError::InvalidField {
        field,
        expected: "an array of strings",
    };
    match get_ci(object, key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.push(s.clone()),
                    _ => return Err(invalid),
                }
            }
            Ok(Some(out))
        }
        Some(_) => Err(invalid),
    }
}
