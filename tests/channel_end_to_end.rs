// tests/channel_end_to_end.rs

mod common;
use crate::common::builders::{AgentConfigBuilder, CommandBuilder, TargetsBuilder, file_names, hex_id};
use crate::common::{FakeProcessRunner, RecordingSink, init_tracing, with_timeout};

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use hostcare::config::AgentConfig;
use hostcare::engine::{AgentRuntime, CommandHandler, Dispatcher, HandlerFuture, RuntimeOptions};
use hostcare::fs::RealFileSystem;
use hostcare::ipc::{CommandChannel, CommandRequest, CommandResponse, EventKind, IpcLayout};
use hostcare::types::CommandType;

type TestResult = Result<(), Box<dyn Error>>;

struct Agent {
    _dir: tempfile::TempDir,
    root: PathBuf,
    commands: PathBuf,
    sink: RecordingSink,
    runner: FakeProcessRunner,
    runtime: AgentRuntime,
}

fn base_config(root: &Path) -> AgentConfigBuilder {
    AgentConfigBuilder::new(root)
        .targets(root.join("targets.json"))
        .antivirus_program(&root.join("no-such-av").to_string_lossy())
        .poll_interval_ms(20)
}

fn agent_with(configure: impl FnOnce(AgentConfigBuilder) -> AgentConfigBuilder) -> Result<Agent, Box<dyn Error>> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path().to_path_buf();
    let config: AgentConfig = configure(base_config(&root)).build();

    let sink = RecordingSink::new();
    let runner = FakeProcessRunner::new();
    let runtime = AgentRuntime::from_config_with_events(
        &config,
        Arc::new(RealFileSystem),
        Arc::new(runner.clone()),
        Arc::new(sink.clone()),
    )?;

    Ok(Agent {
        commands: root.join("ipc").join("commands"),
        root,
        _dir: dir,
        sink,
        runner,
        runtime,
    })
}

fn agent() -> Result<Agent, Box<dyn Error>> {
    agent_with(|b| b)
}

fn read_result(path: &Path) -> Result<Value, Box<dyn Error>> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

#[tokio::test]
async fn startup_creates_ipc_directories() -> TestResult {
    let agent = agent()?;
    assert!(agent.commands.is_dir());
    assert!(agent.root.join("ipc").join("events").is_dir());
    Ok(())
}

#[tokio::test]
async fn clean_all_with_no_groups_answers_and_removes_command() -> TestResult {
    let mut agent = agent()?;
    let id = hex_id(0xa1);
    CommandBuilder::new("CleanAll")
        .id(&id)
        .write_in(&agent.commands, &format!("{id}.json"))?;

    let report = agent.runtime.channel_mut().tick(&CancellationToken::new()).await;

    assert_eq!(report.completed, vec![id.clone()]);
    assert_eq!(file_names(&agent.commands), vec![format!("{id}.result.json")]);

    let result = read_result(&agent.commands.join(format!("{id}.result.json")))?;
    assert_eq!(result["Success"], Value::Bool(true));
    assert_eq!(result["Kind"], "Clean");
    assert_eq!(result["Message"], "0 files, 0 bytes freed (0 groups)");

    assert_eq!(
        agent.sink.kinds(),
        vec![EventKind::CleanupStarted, EventKind::CleanupFinished]
    );
    Ok(())
}

#[tokio::test]
async fn unparseable_command_is_kept_and_reported_once_per_content() -> TestResult {
    let mut agent = agent()?;
    let name = "deadbeefdeadbeefdeadbeefdeadbeef.json";
    let path = agent.commands.join(name);
    std::fs::write(&path, "{ this is not json")?;

    let cancel = CancellationToken::new();
    for _ in 0..3 {
        let report = agent.runtime.channel_mut().tick(&cancel).await;
        assert_eq!(report.malformed, vec![path.clone()]);
        assert!(report.completed.is_empty());
    }

    assert!(path.exists());
    assert_eq!(file_names(&agent.commands), vec![name.to_string()]);
    assert_eq!(agent.sink.of_kind(EventKind::Error).len(), 1);

    // New contents re-arm reporting.
    std::fs::write(&path, r#"{"Type":"Reboot"}"#)?;
    agent.runtime.channel_mut().tick(&cancel).await;
    agent.runtime.channel_mut().tick(&cancel).await;
    assert_eq!(agent.sink.of_kind(EventKind::Error).len(), 2);
    assert!(path.exists());
    Ok(())
}

#[tokio::test]
async fn command_without_identity_is_never_answered() -> TestResult {
    let mut agent = agent()?;
    let path = CommandBuilder::new("Clean").write_in(&agent.commands, "please-clean.json")?;

    let cancel = CancellationToken::new();
    for _ in 0..2 {
        let report = agent.runtime.channel_mut().tick(&cancel).await;
        assert_eq!(report.unidentified, vec![path.clone()]);
    }

    assert_eq!(file_names(&agent.commands), vec!["please-clean.json".to_string()]);
    assert!(agent.sink.events().is_empty());
    Ok(())
}

#[tokio::test]
async fn identity_falls_back_to_file_name() -> TestResult {
    let mut agent = agent()?;
    let id = hex_id(0xbeef);
    CommandBuilder::new(0).write_in(&agent.commands, &format!("cmd_{id}.json"))?;

    let report = agent.runtime.channel_mut().tick(&CancellationToken::new()).await;

    assert_eq!(report.completed, vec![id.clone()]);
    assert_eq!(file_names(&agent.commands), vec![format!("{id}.result.json")]);
    Ok(())
}

#[tokio::test]
async fn answered_command_is_removed_whatever_its_file_name() -> TestResult {
    let mut agent = agent()?;
    let id = hex_id(0xb7);
    CommandBuilder::new("CleanAll")
        .id(&id)
        .write_in(&agent.commands, "request.json")?;

    let cancel = CancellationToken::new();
    let report = agent.runtime.channel_mut().tick(&cancel).await;

    assert_eq!(report.completed, vec![id.clone()]);
    assert_eq!(file_names(&agent.commands), vec![format!("{id}.result.json")]);

    let report = agent.runtime.channel_mut().tick(&cancel).await;

    assert!(report.is_idle());
    assert_eq!(
        agent.sink.kinds(),
        vec![EventKind::CleanupStarted, EventKind::CleanupFinished]
    );
    Ok(())
}

#[tokio::test]
async fn property_names_and_type_are_lenient() -> TestResult {
    let mut agent = agent()?;
    let id = hex_id(7);
    std::fs::write(
        agent.commands.join(format!("{id}.JSON")),
        format!(r#"{{"iD":"{id}","TYPE":"1"}}"#),
    )?;

    let report = agent.runtime.channel_mut().tick(&CancellationToken::new()).await;

    assert_eq!(report.completed, vec![id.clone()]);
    let result = read_result(&agent.commands.join(format!("{id}.result.json")))?;
    assert_eq!(result["Kind"], "UpdateAll");
    Ok(())
}

#[tokio::test]
async fn ticking_again_leaves_published_result_untouched() -> TestResult {
    let mut agent = agent()?;
    let id = hex_id(3);
    CommandBuilder::new("Clean")
        .id(&id)
        .write_in(&agent.commands, &format!("{id}.json"))?;

    let cancel = CancellationToken::new();
    agent.runtime.channel_mut().tick(&cancel).await;
    let result_path = agent.commands.join(format!("{id}.result.json"));
    let first = std::fs::read(&result_path)?;

    let report = agent.runtime.channel_mut().tick(&cancel).await;

    assert!(report.is_idle());
    assert_eq!(std::fs::read(&result_path)?, first);
    assert_eq!(file_names(&agent.commands), vec![format!("{id}.result.json")]);
    Ok(())
}

#[tokio::test]
async fn stale_results_and_duplicate_commands_are_purged() -> TestResult {
    let mut agent = agent()?;
    let id = hex_id(0x51);
    let other = hex_id(0x52);

    CommandBuilder::new("Clean")
        .id(&id)
        .write_in(&agent.commands, &format!("{id}.json"))?;
    CommandBuilder::new("Clean")
        .id(&id)
        .write_in(&agent.commands, &format!("{id}_copy.json"))?;
    std::fs::write(agent.commands.join(format!("{id}.result.old.json")), "{}")?;
    std::fs::write(agent.commands.join(format!("{id}_retry.result.json")), "{}")?;
    std::fs::write(agent.commands.join(format!("{other}.result.json")), "{}")?;

    let report = agent.runtime.channel_mut().tick(&CancellationToken::new()).await;

    // Both command files carry the same identity; the first one answers it
    // and the purge takes the duplicate with it.
    assert_eq!(report.completed, vec![id.clone()]);
    assert_eq!(
        file_names(&agent.commands),
        vec![format!("{id}.result.json"), format!("{other}.result.json")]
    );
    Ok(())
}

#[tokio::test]
async fn glob_characters_in_identity_are_matched_literally() -> TestResult {
    let mut agent = agent()?;
    CommandBuilder::new("Clean")
        .id("job[1]")
        .write_in(&agent.commands, "job[1].json")?;
    CommandBuilder::new("Clean").write_in(&agent.commands, "job1.json")?;

    let report = agent.runtime.channel_mut().tick(&CancellationToken::new()).await;

    assert_eq!(report.completed, vec!["job[1]".to_string()]);
    assert_eq!(
        file_names(&agent.commands),
        vec!["job1.json".to_string(), "job[1].result.json".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn commands_are_handled_in_name_order() -> TestResult {
    let mut agent = agent()?;
    let first = hex_id(1);
    let second = hex_id(2);
    CommandBuilder::new("Clean")
        .id(&second)
        .write_in(&agent.commands, &format!("{second}.json"))?;
    CommandBuilder::new("Clean")
        .id(&first)
        .write_in(&agent.commands, &format!("{first}.json"))?;

    let report = agent.runtime.channel_mut().tick(&CancellationToken::new()).await;

    assert_eq!(report.completed, vec![first, second]);
    Ok(())
}

#[tokio::test]
async fn cleanup_options_flow_from_the_payload() -> TestResult {
    let mut agent = agent()?;
    let scratch = agent.root.join("scratch");
    std::fs::create_dir_all(&scratch)?;
    std::fs::write(scratch.join("a.tmp"), vec![0u8; 10])?;
    std::fs::write(scratch.join("b.tmp"), vec![0u8; 20])?;
    TargetsBuilder::new()
        .group("scratch", [scratch.join("*.tmp").to_string_lossy().into_owned()])
        .group("other", [agent.root.join("missing").to_string_lossy().into_owned()])
        .write_to(&agent.root.join("targets.json"))?;

    let id = hex_id(0x5a);
    CommandBuilder::new("Clean")
        .id(&id)
        .field("groups", vec!["SCRATCH"])
        .field("Simulation", true)
        .write_in(&agent.commands, &format!("{id}.json"))?;

    agent.runtime.channel_mut().tick(&CancellationToken::new()).await;

    let result = read_result(&agent.commands.join(format!("{id}.result.json")))?;
    assert_eq!(result["Success"], Value::Bool(true));
    assert_eq!(result["Message"], "2 files, 30 bytes would free (1 groups)");
    assert!(scratch.join("a.tmp").exists());
    assert!(scratch.join("b.tmp").exists());
    Ok(())
}

#[tokio::test]
async fn agent_dry_run_forces_simulation() -> TestResult {
    let mut agent = agent_with(|b| b.dry_run(true))?;
    let victim = agent.root.join("victim.log");
    std::fs::write(&victim, "x")?;
    TargetsBuilder::new()
        .group("logs", [victim.to_string_lossy().into_owned()])
        .write_to(&agent.root.join("targets.json"))?;

    let id = hex_id(0xd7);
    CommandBuilder::new("Clean")
        .id(&id)
        .write_in(&agent.commands, &format!("{id}.json"))?;

    agent.runtime.channel_mut().tick(&CancellationToken::new()).await;

    assert!(victim.exists());
    let result = read_result(&agent.commands.join(format!("{id}.result.json")))?;
    assert_eq!(result["Message"], "1 files, 1 bytes would free (1 groups)");
    Ok(())
}

#[tokio::test]
async fn update_command_drives_the_pipeline() -> TestResult {
    let mut agent = agent()?;
    let id = hex_id(0x42);
    CommandBuilder::new("Update")
        .id(&id)
        .write_in(&agent.commands, &format!("{id}.json"))?;

    agent.runtime.channel_mut().tick(&CancellationToken::new()).await;

    let lines = agent.runner.command_lines();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("winget upgrade --all"));
    assert_eq!(lines[1], "UsoClient.exe StartScan");
    assert_eq!(lines[3], "UsoClient.exe StartInstall");

    let result = read_result(&agent.commands.join(format!("{id}.result.json")))?;
    assert_eq!(result["Success"], Value::Bool(true));
    assert_eq!(result["Kind"], "UpdateAll");
    assert_eq!(
        agent.sink.kinds(),
        vec![EventKind::UpdateStarted, EventKind::UpdateFinished]
    );
    Ok(())
}

#[tokio::test]
async fn quarantine_moves_files_that_keep_failing() -> TestResult {
    let mut agent = agent_with(|b| b.quarantine_after(2))?;
    let name = format!("{}.json", hex_id(0xbad));
    let path = agent.commands.join(&name);
    std::fs::write(&path, r#"{"Type": true}"#)?;
    let stray = agent.commands.join("stray.json");
    std::fs::write(&stray, r#"{"Type":"Clean"}"#)?;

    let cancel = CancellationToken::new();
    let first = agent.runtime.channel_mut().tick(&cancel).await;
    assert!(first.quarantined.is_empty());
    assert!(path.exists());

    let second = agent.runtime.channel_mut().tick(&cancel).await;
    let mut quarantined = second.quarantined.clone();
    quarantined.sort();
    let mut expected = vec![path.clone(), stray.clone()];
    expected.sort();
    assert_eq!(quarantined, expected);

    let quarantine = agent.commands.join("quarantine");
    assert_eq!(file_names(&quarantine), vec![name, "stray.json".to_string()]);
    assert!(file_names(&agent.commands).is_empty());

    // One report for the malformed payload, one per quarantined file.
    assert_eq!(agent.sink.of_kind(EventKind::Error).len(), 3);
    Ok(())
}

struct FailingHandler;

impl CommandHandler for FailingHandler {
    fn handle<'a>(
        &'a self,
        _request: &'a CommandRequest,
        _cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a> {
        Box::pin(async { Err(anyhow!("disk on fire")) })
    }
}

fn channel_with(dispatcher: Dispatcher, root: &Path, sink: &RecordingSink) -> Result<CommandChannel, Box<dyn Error>> {
    let fs = Arc::new(RealFileSystem);
    let layout = IpcLayout::new(root);
    layout.ensure(fs.as_ref())?;
    Ok(CommandChannel::new(fs, layout, dispatcher, Arc::new(sink.clone()))?)
}

#[tokio::test]
async fn handler_failure_becomes_failure_result() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = RecordingSink::new();
    let dispatcher =
        Dispatcher::new(Arc::new(sink.clone())).register(CommandType::Clean, Arc::new(FailingHandler));
    let mut channel = channel_with(dispatcher, dir.path(), &sink)?;
    let commands = channel.layout().commands_dir().to_path_buf();

    let id = hex_id(0xf00);
    CommandBuilder::new("Clean")
        .id(&id)
        .write_in(&commands, &format!("{id}.json"))?;

    let report = channel.tick(&CancellationToken::new()).await;

    assert_eq!(report.completed, vec![id.clone()]);
    let body = std::fs::read_to_string(commands.join(format!("{id}.result.json")))?;
    let response: CommandResponse = serde_json::from_str(&body)?;
    assert!(!response.success);
    assert_eq!(response.kind, "Clean");
    assert!(response.message.contains("disk on fire"));

    let errors = sink.of_kind(EventKind::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.starts_with("Command execution error"));
    Ok(())
}

#[tokio::test]
async fn command_without_handler_is_left_in_place() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = RecordingSink::new();
    let dispatcher =
        Dispatcher::new(Arc::new(sink.clone())).register(CommandType::Clean, Arc::new(FailingHandler));
    let mut channel = channel_with(dispatcher, dir.path(), &sink)?;
    let commands = channel.layout().commands_dir().to_path_buf();

    let id = hex_id(0x0dd);
    let path = CommandBuilder::new("UpdateAll")
        .id(&id)
        .write_in(&commands, &format!("{id}.json"))?;

    let report = channel.tick(&CancellationToken::new()).await;

    assert_eq!(report.unhandled, vec![path.clone()]);
    assert!(path.exists());
    assert!(sink.events().is_empty());
    Ok(())
}

#[tokio::test]
async fn single_scan_runtime_handles_pending_commands_and_exits() -> TestResult {
    let agent = agent()?;
    let id = hex_id(0x0ce);
    CommandBuilder::new("Clean")
        .id(&id)
        .write_in(&agent.commands, &format!("{id}.json"))?;

    let runtime = agent.runtime.with_options(RuntimeOptions {
        poll_interval: Duration::from_millis(20),
        exit_after_first_scan: true,
    });
    with_timeout(runtime.run(CancellationToken::new())).await?;

    assert_eq!(file_names(&agent.commands), vec![format!("{id}.result.json")]);
    Ok(())
}

#[tokio::test]
async fn runtime_picks_up_late_commands_and_stops_on_cancel() -> TestResult {
    let agent = agent()?;
    let commands = agent.commands.clone();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(agent.runtime.run(cancel.clone()));

    let id = hex_id(0x1a7e);
    CommandBuilder::new("Clean")
        .id(&id)
        .write_in(&commands, &format!("{id}.json"))?;

    let result_path = commands.join(format!("{id}.result.json"));
    with_timeout(async {
        while !result_path.exists() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    cancel.cancel();
    with_timeout(handle).await??;
    Ok(())
}
