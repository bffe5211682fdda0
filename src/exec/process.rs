// src/exec/process.rs

//! Bounded external-process execution.
//!
//! Every program the agent launches goes through a [`ProcessRunner`]. The
//! production runner ([`TokioProcessRunner`]) guarantees that a process which
//! outlives its timeout, or whose run is cancelled, is killed together with
//! all of its descendants before the call returns.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Exit status and captured output of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, or `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    /// Standard output followed by standard error.
    pub output: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("{command} timed out after {}s", timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("{command} cancelled")]
    Cancelled { command: String },

    #[error("waiting for {command}: {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },
}

pub type ProcessFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ProcessOutput, ProcessError>> + Send + 'a>>;

/// Trait abstracting how external programs are run.
///
/// Production code uses [`TokioProcessRunner`]; tests provide a scripted fake
/// that records invocations without spawning anything.
pub trait ProcessRunner: Send + Sync {
    fn run<'a>(
        &'a self,
        program: &'a str,
        args: &'a [String],
        timeout: Duration,
        cancel: &'a CancellationToken,
    ) -> ProcessFuture<'a>;
}

/// Runs programs with `tokio::process`, never attached to a console.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for TokioProcessRunner {
    fn run<'a>(
        &'a self,
        program: &'a str,
        args: &'a [String],
        timeout: Duration,
        cancel: &'a CancellationToken,
    ) -> ProcessFuture<'a> {
        Box::pin(run_bounded(program, args, timeout, cancel))
    }
}

fn describe(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

async fn run_bounded(
    program: &str,
    args: &[String],
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ProcessOutput, ProcessError> {
    let command = describe(program, args);
    info!(%command, timeout_secs = timeout.as_secs(), "starting process");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so the whole tree can be signalled at once.
    #[cfg(unix)]
    cmd.process_group(0);

    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        command: command.clone(),
        source,
    })?;

    // `Child::id` is gone once the child has been reaped; keep it for the
    // descendants that may outlive it.
    let pid = child.id();
    let deadline = Instant::now() + timeout;
    let stdout = spawn_capture(child.stdout.take());
    let stderr = spawn_capture(child.stderr.take());
    let capture = [stdout.abort_handle(), stderr.abort_handle()];

    let status = tokio::select! {
        status = child.wait() => status.map_err(|source| ProcessError::Wait {
            command: command.clone(),
            source,
        })?,

        _ = tokio::time::sleep_until(deadline) => {
            warn!(%command, timeout_secs = timeout.as_secs(), "process timed out; killing process tree");
            kill_tree(pid, &mut child).await;
            abort_all(&capture);
            return Err(ProcessError::Timeout { command, timeout });
        }

        _ = cancel.cancelled() => {
            info!(%command, "cancellation requested; killing process tree");
            kill_tree(pid, &mut child).await;
            abort_all(&capture);
            return Err(ProcessError::Cancelled { command });
        }
    };
    let exit_code = status.code().unwrap_or(-1);

    // Descendants that inherited the pipes keep them open after the child
    // itself has exited, so draining shares the same deadline.
    let drain = async {
        let mut output = collect(stdout).await;
        output.push_str(&collect(stderr).await);
        output
    };

    tokio::select! {
        output = drain => {
            info!(%command, exit_code, "process exited");
            Ok(ProcessOutput { exit_code, output })
        }

        _ = tokio::time::sleep_until(deadline) => {
            warn!(%command, exit_code, timeout_secs = timeout.as_secs(), "process exited but descendants still hold its output; killing process tree");
            kill_tree(pid, &mut child).await;
            abort_all(&capture);
            Err(ProcessError::Timeout { command, timeout })
        }

        _ = cancel.cancelled() => {
            info!(%command, "cancellation requested; killing process tree");
            kill_tree(pid, &mut child).await;
            abort_all(&capture);
            Err(ProcessError::Cancelled { command })
        }
    }
}

fn abort_all(handles: &[AbortHandle]) {
    for handle in handles {
        handle.abort();
    }
}

/// Drain a child pipe in the background so the child never blocks on a full
/// buffer.
fn spawn_capture<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                debug!(error = %e, "error reading child output");
            }
        }
        buf
    })
}

async fn collect(handle: JoinHandle<Vec<u8>>) -> String {
    match handle.await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            debug!(error = %e, "output capture task failed");
            String::new()
        }
    }
}

/// Terminate the child and every process it started. `pid` is the child's
/// pid as captured at spawn time.
async fn kill_tree(pid: Option<u32>, child: &mut Child) {
    if let Some(pid) = pid {
        #[cfg(unix)]
        {
            // The child leads its own process group (see `process_group(0)`),
            // so its pid is the group id.
            // SAFETY: killpg only sends a signal; no memory is shared.
            let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
            if rc != 0 {
                debug!(pid, error = %io::Error::last_os_error(), "killpg failed");
            }
        }

        #[cfg(windows)]
        {
            let result = Command::new("taskkill")
                .args(["/PID", &pid.to_string(), "/T", "/F"])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            if let Err(e) = result {
                debug!(pid, error = %e, "taskkill failed");
            }
        }
    }

    if let Err(e) = child.kill().await {
        debug!(error = %e, "child already gone while killing");
    }
}
