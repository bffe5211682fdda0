#![allow(dead_code)]

use std::path::{Path, PathBuf};

use hostcare::config::{AgentConfig, RawAgentConfig, StepCommand};
use serde_json::{json, Value};

/// Builder for `AgentConfig` to simplify test setup.
pub struct AgentConfigBuilder {
    config: RawAgentConfig,
}

impl AgentConfigBuilder {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        let mut config = RawAgentConfig::default();
        config.agent.data_root = Some(data_root.into());
        Self { config }
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.agent.poll_interval_ms = ms;
        self
    }

    pub fn dry_run(mut self, val: bool) -> Self {
        self.config.agent.dry_run = val;
        self
    }

    pub fn quarantine_after(mut self, attempts: u32) -> Self {
        self.config.agent.quarantine_after = Some(attempts);
        self
    }

    pub fn targets(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cleanup.targets = Some(path.into());
        self
    }

    /// Point the antivirus steps at a program path (tests use this to
    /// control whether the tool "exists").
    pub fn antivirus_program(mut self, program: &str) -> Self {
        let update = &mut self.config.update;
        update.antivirus_signatures.program = program.to_string();
        update.antivirus_scan.program = program.to_string();
        self
    }

    pub fn package_manager(mut self, step: StepCommand) -> Self {
        self.config.update.package_manager = step;
        self
    }

    pub fn build(self) -> AgentConfig {
        AgentConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Builder for the cleanup targets document.
#[derive(Default)]
pub struct TargetsBuilder {
    groups: Vec<(String, Vec<String>)>,
    exclusions: Vec<String>,
}

impl TargetsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group<I, S>(mut self, name: &str, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .push((name.to_string(), paths.into_iter().map(Into::into).collect()));
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclusions.push(pattern.into());
        self
    }

    pub fn to_json(&self) -> String {
        let groups: Vec<Value> = self
            .groups
            .iter()
            .map(|(name, paths)| json!({ "name": name, "paths": paths }))
            .collect();
        json!({ "groups": groups, "exclusions": self.exclusions }).to_string()
    }

    /// Write the document to `path`, creating parent directories.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json())
    }
}

/// Builder for a command file body.
pub struct CommandBuilder {
    body: serde_json::Map<String, Value>,
}

impl CommandBuilder {
    pub fn new(kind: impl Into<Value>) -> Self {
        let mut body = serde_json::Map::new();
        body.insert("Type".to_string(), kind.into());
        Self { body }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.body.insert("Id".to_string(), json!(id));
        self
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.body.insert(key.to_string(), value.into());
        self
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.body.clone()).to_string()
    }

    /// Write `<dir>/<file_name>` and return its path.
    pub fn write_in(&self, dir: &Path, file_name: &str) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(file_name);
        std::fs::write(&path, self.to_json())?;
        Ok(path)
    }
}

/// A 32-hex-digit identity derived from a small number.
pub fn hex_id(n: u32) -> String {
    format!("{n:032x}")
}

/// Names of the files directly inside `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
