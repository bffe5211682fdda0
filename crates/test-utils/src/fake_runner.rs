use std::sync::{Arc, Mutex};
use std::time::Duration;

use hostcare::exec::process::{ProcessError, ProcessFuture, ProcessOutput, ProcessRunner};
use tokio_util::sync::CancellationToken;

/// One invocation seen by [`FakeProcessRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl RecordedCall {
    /// `program arg1 arg2 ...`
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What a scripted program does when run.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    Exit(i32),
    SpawnFailure,
    Timeout,
    /// Cancel the given token, then report the run as cancelled. Used to
    /// simulate shutdown arriving in the middle of a step.
    CancelDuring(CancellationToken),
}

#[derive(Debug, Default)]
struct Script {
    rules: Vec<(String, FakeResponse)>,
    calls: Vec<RecordedCall>,
}

/// A fake process runner that:
/// - records every invocation
/// - answers with the first scripted response whose key is contained in
///   the command line, or exit code 0 when nothing matches.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessRunner {
    script: Arc<Mutex<Script>>,
}

impl FakeProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, command_contains: &str, response: FakeResponse) -> Self {
        self.script
            .lock()
            .unwrap()
            .rules
            .push((command_contains.to_string(), response));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(RecordedCall::command_line).collect()
    }
}

impl ProcessRunner for FakeProcessRunner {
    fn run<'a>(
        &'a self,
        program: &'a str,
        args: &'a [String],
        timeout: Duration,
        cancel: &'a CancellationToken,
    ) -> ProcessFuture<'a> {
        let call = RecordedCall {
            program: program.to_string(),
            args: args.to_vec(),
            timeout,
        };
        let line = call.command_line();

        let response = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(call);
            script
                .rules
                .iter()
                .find(|(key, _)| line.contains(key.as_str()))
                .map(|(_, r)| r.clone())
        };

        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(ProcessError::Cancelled { command: line });
            }
            match response {
                None => Ok(ProcessOutput {
                    exit_code: 0,
                    output: String::new(),
                }),
                Some(FakeResponse::Exit(code)) => Ok(ProcessOutput {
                    exit_code: code,
                    output: format!("exit {code}\n"),
                }),
                Some(FakeResponse::SpawnFailure) => Err(ProcessError::Spawn {
                    command: line,
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "program not found"),
                }),
                Some(FakeResponse::Timeout) => Err(ProcessError::Timeout { command: line, timeout }),
                Some(FakeResponse::CancelDuring(token)) => {
                    token.cancel();
                    Err(ProcessError::Cancelled { command: line })
                }
            }
        })
    }
}
