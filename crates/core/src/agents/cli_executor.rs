//! Subprocess runner for CLI-based agents.
//!
//! Agent CLIs print one JSON object per line. [`CliCommand`] spawns the
//! process, yields the parsed lines as they arrive and turns a non-zero
//! exit status or an exceeded deadline into an [`AgentError`].

use crate::agents::base::AgentError;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::Instant;
use tokio_stream::Stream;
use tracing::{debug, warn};

pub type JsonLines = Pin<Box<dyn Stream<Item = Result<serde_json::Value, AgentError>> + Send>>;

/// One invocation of an agent CLI.
#[derive(Debug, Clone)]
pub struct CliCommand {
    program: String,
    args: Vec<String>,
    working_dir: String,
    timeout: Option<Duration>,
}

impl CliCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: ".".to_string(),
            timeout: None,
        }
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn current_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Kill the process when it has not finished after `timeout`.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Spawn the process and stream its stdout as JSON values.
    ///
    /// Empty lines are skipped. A line that is not JSON yields
    /// `AgentError::StreamParseError` and reading goes on. The stream ends
    /// with `AgentError::ExecutionError` carrying stderr when the process
    /// exits unsuccessfully, or with `AgentError::Timeout` after the
    /// process was killed for running too long.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use nk_core::agents::cli_executor::CliCommand;
    /// use tokio_stream::StreamExt;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let values: Vec<_> = CliCommand::new("echo")
    ///         .args(vec![r#"{"type":"result"}"#.to_string()])
    ///         .json_lines()
    ///         .collect()
    ///         .await;
    ///     println!("Got {} values", values.len());
    /// }
    /// ```
    pub fn json_lines(self) -> JsonLines {
        let stream = async_stream::stream! {
            let CliCommand { program, args, working_dir, timeout } = self;
            let deadline = timeout.map(|limit| Instant::now() + limit);

            let mut child = match Command::new(&program)
                .args(&args)
                .current_dir(&working_dir)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
            {
                Ok(child) => child,
                Err(e) => {
                    yield Err(AgentError::ExecutionError(format!(
                        "Failed to spawn command '{program}': {e}"
                    )));
                    return;
                }
            };
            debug!(program = %program, pid = ?child.id(), "agent process started");

            let Some(stdout) = child.stdout.take() else {
                yield Err(AgentError::ExecutionError("Failed to capture stdout".to_string()));
                return;
            };
            let mut lines = BufReader::new(stdout).lines();

            loop {
                let next = match deadline {
                    Some(deadline) => match tokio::time::timeout_at(deadline, lines.next_line()).await {
                        Ok(next) => next,
                        Err(_) => {
                            let _ = child.kill().await;
                            let limit = timeout.unwrap_or_default();
                            warn!(program = %program, ?limit, "agent process killed after timeout");
                            yield Err(AgentError::Timeout(limit));
                            return;
                        }
                    },
                    None => lines.next_line().await,
                };

                let line = match next {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(AgentError::StreamParseError(format!("Failed to read output: {e}")));
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                match serde_json::from_str::<serde_json::Value>(&line) {
                    Ok(value) => yield Ok(value),
                    Err(e) => {
                        yield Err(AgentError::StreamParseError(format!(
                            "Failed to parse JSON: {e} (line: {line})"
                        )));
                    }
                }
            }

            match child.wait_with_output().await {
                Ok(output) if !output.status.success() => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    yield Err(AgentError::ExecutionError(format!(
                        "'{program}' exited with {}: {}",
                        output.status,
                        stderr.trim()
                    )));
                }
                Ok(_) => {}
                Err(e) => {
                    yield Err(AgentError::ExecutionError(format!(
                        "Failed to wait for '{program}': {e}"
                    )));
                }
            }
        };

        Box::pin(stream)
    }
}
