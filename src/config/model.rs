// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

/// Agent configuration as read from a TOML file.
///
/// ```toml
/// [agent]
/// data_root = "/var/lib/hostcare"
/// poll_interval_ms = 500
/// dry_run = false
/// quarantine_after = 20
///
/// [cleanup]
/// targets = "/etc/hostcare/cleanup_targets.json"
///
/// [update.package_manager]
/// program = "winget"
/// args = ["upgrade", "--all", "--silent"]
/// timeout_secs = 1800
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawAgentConfig {
    #[serde(default)]
    pub agent: AgentSection,

    #[serde(default)]
    pub cleanup: CleanupSection,

    #[serde(default)]
    pub update: UpdateSection,
}

/// Validated agent configuration.
///
/// Only constructed through `TryFrom<RawAgentConfig>` (see `validate.rs`),
/// so the rest of the crate can rely on intervals and timeouts being sane.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub agent: AgentSection,
    pub cleanup: CleanupSection,
    pub update: UpdateSection,
}

impl AgentConfig {
    pub(crate) fn new_unchecked(
        agent: AgentSection,
        cleanup: CleanupSection,
        update: UpdateSection,
    ) -> Self {
        Self {
            agent,
            cleanup,
            update,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        let raw = RawAgentConfig::default();
        Self::new_unchecked(raw.agent, raw.cleanup, raw.update)
    }
}

/// `[agent]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    /// Root directory holding `ipc/commands` and `ipc/events`.
    ///
    /// If `None`, [`crate::config::default_data_root`] is used.
    #[serde(default)]
    pub data_root: Option<PathBuf>,

    /// Delay between two scans of the commands directory.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Force simulation mode for every cleanup request.
    #[serde(default)]
    pub dry_run: bool,

    /// Move malformed or unidentifiable command files to
    /// `ipc/commands/quarantine` after this many unchanged attempts.
    ///
    /// `None` keeps them in place forever.
    #[serde(default)]
    pub quarantine_after: Option<u32>,
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            data_root: None,
            poll_interval_ms: default_poll_interval_ms(),
            dry_run: false,
            quarantine_after: None,
        }
    }
}

/// `[cleanup]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CleanupSection {
    /// Explicit location of `cleanup_targets.json`. Checked before the
    /// development-relative and data-root locations.
    #[serde(default)]
    pub targets: Option<PathBuf>,
}

/// One external program invocation in the update pipeline.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StepCommand {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_step_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_step_timeout_secs() -> u64 {
    120
}

impl StepCommand {
    pub fn new(program: &str, args: &[&str], timeout_secs: u64) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout_secs,
        }
    }
}

/// `[update]` section: the programs behind each pipeline step.
///
/// The antivirus step only runs when `antivirus_signatures.program` exists
/// on disk; environment references in program paths are expanded.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSection {
    #[serde(default = "default_package_manager")]
    pub package_manager: StepCommand,

    #[serde(default = "default_antivirus_signatures")]
    pub antivirus_signatures: StepCommand,

    #[serde(default = "default_antivirus_scan")]
    pub antivirus_scan: StepCommand,

    #[serde(default = "default_os_scan")]
    pub os_scan: StepCommand,

    #[serde(default = "default_os_download")]
    pub os_download: StepCommand,

    #[serde(default = "default_os_install")]
    pub os_install: StepCommand,
}

const DEFENDER_CLI: &str = r"%ProgramFiles%\Windows Defender\MpCmdRun.exe";
const USO_CLIENT: &str = "UsoClient.exe";

fn default_package_manager() -> StepCommand {
    StepCommand::new(
        "winget",
        &[
            "upgrade",
            "--all",
            "--silent",
            "--accept-source-agreements",
            "--accept-package-agreements",
        ],
        60 * 30,
    )
}

fn default_antivirus_signatures() -> StepCommand {
    StepCommand::new(DEFENDER_CLI, &["-SignatureUpdate"], 300)
}

fn default_antivirus_scan() -> StepCommand {
    StepCommand::new(DEFENDER_CLI, &["-Scan", "-ScanType", "1"], 60 * 20)
}

fn default_os_scan() -> StepCommand {
    StepCommand::new(USO_CLIENT, &["StartScan"], 120)
}

fn default_os_download() -> StepCommand {
    StepCommand::new(USO_CLIENT, &["StartDownload"], 120)
}

fn default_os_install() -> StepCommand {
    StepCommand::new(USO_CLIENT, &["StartInstall"], 120)
}

impl Default for UpdateSection {
    fn default() -> Self {
        Self {
            package_manager: default_package_manager(),
            antivirus_signatures: default_antivirus_signatures(),
            antivirus_scan: default_antivirus_scan(),
            os_scan: default_os_scan(),
            os_download: default_os_download(),
            os_install: default_os_install(),
        }
    }
}

impl UpdateSection {
    /// All step commands with the key they are configured under.
    pub fn steps(&self) -> [(&'static str, &StepCommand); 6] {
        [
            ("package_manager", &self.package_manager),
            ("antivirus_signatures", &self.antivirus_signatures),
            ("antivirus_scan", &self.antivirus_scan),
            ("os_scan", &self.os_scan),
            ("os_download", &self.os_download),
            ("os_install", &self.os_install),
        ]
    }
}
