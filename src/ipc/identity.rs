// src/ipc/identity.rs

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::tolerant::get_ci;

static HEX32: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[0-9a-f]{32}").expect("identity regex is valid"));

/// Resolve the identity of a command file.
///
/// The payload `Id` wins when it is a non-blank string; otherwise the first
/// run of 32 hex digits in the file name is used. `None` means the file can
/// never be answered and is left alone.
pub fn extract_identity(file_name: &str, body: &str) -> Option<String> {
    identity_from_body(body).or_else(|| identity_from_name(file_name))
}

/// `Id` property of the payload, any casing. Bodies that are not JSON
/// objects simply have no payload identity.
pub fn identity_from_body(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let Value::Object(object) = value else {
        return None;
    };
    match get_ci(&object, "id")? {
        Value::String(s) if is_usable(s) => Some(s.clone()),
        _ => None,
    }
}

pub fn identity_from_name(file_name: &str) -> Option<String> {
    HEX32.find(file_name).map(|m| m.as_str().to_string())
}

/// The identity becomes part of a file name next to the command, so it
/// must not be blank or able to address another directory.
fn is_usable(id: &str) -> bool {
    !id.trim().is_empty()
        && !id.contains(['/', '\\'])
        && id != "."
        && id != ".."
        && !id.chars().any(char::is_control)
}
