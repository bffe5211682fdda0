// tests/config_loading.rs

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use hostcare::apply_cli_overrides;
use hostcare::cli::CliArgs;
use hostcare::config::{AgentConfig, RawAgentConfig, load_and_validate, load_or_default};
use hostcare::errors::AgentError;
use hostcare::exec::cleanup::target_candidates;

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> Result<(tempfile::TempDir, PathBuf), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("hostcare.toml");
    std::fs::write(&path, contents)?;
    Ok((dir, path))
}

#[test]
fn defaults_without_a_config_file() -> TestResult {
    let cfg = load_or_default(None)?;

    assert_eq!(cfg.agent.poll_interval_ms, 500);
    assert!(!cfg.agent.dry_run);
    assert_eq!(cfg.agent.quarantine_after, None);
    assert_eq!(cfg.update.package_manager.program, "winget");
    assert_eq!(cfg.update.package_manager.timeout_secs, 1800);
    assert_eq!(cfg.update.antivirus_scan.args, vec!["-Scan", "-ScanType", "1"]);
    assert_eq!(cfg.update.os_install.args, vec!["StartInstall"]);
    Ok(())
}

#[test]
fn partial_file_keeps_defaults_for_the_rest() -> TestResult {
    let (_dir, path) = write_config(
        r#"
[agent]
data_root = "/srv/hostcare"
poll_interval_ms = 250
quarantine_after = 5

[cleanup]
targets = "/etc/hostcare/targets.json"

[update.package_manager]
program = "apt-get"
args = ["-y", "upgrade"]
"#,
    )?;

    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.agent.data_root, Some(PathBuf::from("/srv/hostcare")));
    assert_eq!(cfg.agent.poll_interval_ms, 250);
    assert_eq!(cfg.agent.quarantine_after, Some(5));
    assert_eq!(cfg.cleanup.targets, Some(PathBuf::from("/etc/hostcare/targets.json")));
    assert_eq!(cfg.update.package_manager.program, "apt-get");
    assert_eq!(cfg.update.package_manager.timeout_secs, 120);
    assert_eq!(cfg.update.os_scan.program, "UsoClient.exe");
    Ok(())
}

#[test]
fn zero_poll_interval_is_rejected() -> TestResult {
    let (_dir, path) = write_config("[agent]\npoll_interval_ms = 0\n")?;

    let err = load_and_validate(&path).expect_err("zero interval must be rejected");

    match err {
        AgentError::ConfigError(msg) => assert!(msg.contains("poll_interval_ms"), "{msg}"),
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[test]
fn zero_quarantine_threshold_is_rejected() {
    let mut raw = RawAgentConfig::default();
    raw.agent.quarantine_after = Some(0);

    let err = AgentConfig::try_from(raw).expect_err("zero threshold must be rejected");
    assert!(err.to_string().contains("quarantine_after"));
}

#[test]
fn empty_step_program_is_rejected() {
    let mut raw = RawAgentConfig::default();
    raw.update.os_download.program = "  ".to_string();

    let err = AgentConfig::try_from(raw).expect_err("empty program must be rejected");
    assert!(err.to_string().contains("[update.os_download].program"));
}

#[test]
fn zero_step_timeout_is_rejected() {
    let mut raw = RawAgentConfig::default();
    raw.update.antivirus_signatures.timeout_secs = 0;

    let err = AgentConfig::try_from(raw).expect_err("zero timeout must be rejected");
    assert!(err.to_string().contains("[update.antivirus_signatures].timeout_secs"));
}

#[test]
fn invalid_toml_is_a_toml_error() -> TestResult {
    let (_dir, path) = write_config("[agent\npoll_interval_ms = 3")?;

    let err = load_and_validate(&path).expect_err("broken TOML must fail");
    assert!(matches!(err, AgentError::TomlError(_)), "{err:?}");
    Ok(())
}

#[test]
fn explicit_config_path_must_exist() {
    let err = load_or_default(Some(std::path::Path::new("/definitely/not/here.toml")))
        .expect_err("missing explicit config must fail");
    assert!(matches!(err, AgentError::IoError(_)), "{err:?}");
}

#[test]
fn cli_flags_override_the_config() -> TestResult {
    let args = CliArgs::try_parse_from(["hostcare", "--data-root", "/tmp/hc", "--dry-run", "--once"])?;
    let mut cfg = load_or_default(args.config.as_deref())?;

    apply_cli_overrides(&mut cfg, &args);

    assert!(args.once);
    assert!(cfg.agent.dry_run);
    assert_eq!(cfg.agent.data_root, Some(PathBuf::from("/tmp/hc")));
    assert_eq!(Duration::from_millis(cfg.agent.poll_interval_ms), Duration::from_millis(500));
    Ok(())
}

#[test]
fn targets_are_looked_up_explicit_then_dev_then_data_root() {
    let candidates = target_candidates(
        Some(std::path::Path::new("/etc/hc/targets.json")),
        std::path::Path::new("/var/lib/hc"),
    );

    assert_eq!(
        candidates,
        vec![
            PathBuf::from("/etc/hc/targets.json"),
            PathBuf::from("data").join("cleanup_targets.json"),
            PathBuf::from("/var/lib/hc").join("cleanup_targets.json"),
        ]
    );
}
