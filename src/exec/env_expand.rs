// src/exec/env_expand.rs

//! Environment-variable expansion for configured paths.
//!
//! Cleanup targets are authored on Windows (`%TEMP%\*.tmp`) but the agent
//! also runs elsewhere, so three reference styles are understood:
//! `%NAME%`, `${NAME}` and `$NAME`. References to unset variables are left
//! verbatim, which makes the resulting path simply not exist.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static ENV_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%([A-Za-z_][A-Za-z0-9_()]*)%|\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("env reference regex is valid")
});

/// Expand references against the process environment.
pub fn expand_env(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

/// Expand references using `lookup` to resolve variable names.
pub fn expand_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let expanded: Cow<'_, str> = ENV_REF.replace_all(input, |caps: &Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        lookup(name).unwrap_or_else(|| caps[0].to_string())
    });
    expanded.into_owned()
}
