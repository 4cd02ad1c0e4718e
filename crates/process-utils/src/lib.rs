//! Helpers for driving external media tools (yt-dlp and friends).
//!
//! Two modes of use:
//! - [`run_tool`] for short invocations whose whole output is consumed at once
//!   (playlist extraction via `--dump-single-json`);
//! - [`spawn_streaming`] for long-running downloads where stdout must be read
//!   line by line to surface progress while the tool is still running.
//!
//! Non-zero exit codes become [`ToolError::NonZeroExit`] carrying a bounded
//! tail of stderr so callers get a useful message without unbounded buffering.

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};

/// Maximum number of stderr lines retained for error reporting.
const STDERR_TAIL_LINES: usize = 20;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Error type for external tool invocations.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error while reading {tool} output: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr_tail}")]
    NonZeroExit {
        tool: String,
        status: std::process::ExitStatus,
        stderr_tail: String,
    },
}

/// Result of a buffered tool invocation.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

impl NoWindowExt for Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a [`Command`] prepared for running a background media tool:
/// no console window on Windows, no stdin, and killed if dropped mid-flight.
pub fn tool_command(program: impl AsRef<OsStr>) -> Command {
    let mut cmd = Command::new(program);
    cmd.no_window();
    cmd.stdin(Stdio::null());
    cmd.kill_on_drop(true);
    cmd
}

fn tool_name(cmd: &Command) -> String {
    cmd.as_std().get_program().to_string_lossy().into_owned()
}

fn tail(lines: &VecDeque<String>) -> String {
    lines.iter().cloned().collect::<Vec<_>>().join("\n")
}

/// Run a tool to completion, capturing stdout and stderr.
///
/// Returns [`ToolError::NonZeroExit`] with the stderr tail when the tool
/// reports failure.
pub async fn run_tool(mut cmd: Command) -> Result<ToolOutput, ToolError> {
    let tool = tool_name(&cmd);

    let output = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| ToolError::Spawn {
            tool: tool.clone(),
            source,
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let lines: Vec<&str> = stderr.lines().collect();
        let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
        return Err(ToolError::NonZeroExit {
            tool,
            status: output.status,
            stderr_tail: lines[start..].join("\n"),
        });
    }

    Ok(ToolOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr,
    })
}

/// A child process whose stdout is consumed line by line.
///
/// Stderr is drained concurrently into a bounded tail so a failing tool can
/// never deadlock on a full pipe.
pub struct StreamingChild {
    tool: String,
    child: Child,
    stdout_lines: Lines<BufReader<ChildStdout>>,
    stderr_task: tokio::task::JoinHandle<VecDeque<String>>,
}

impl StreamingChild {
    /// Next stdout line, or `None` once the stream is closed.
    pub async fn next_line(&mut self) -> Result<Option<String>, ToolError> {
        self.stdout_lines
            .next_line()
            .await
            .map_err(|source| ToolError::Io {
                tool: self.tool.clone(),
                source,
            })
    }

    /// Wait for the tool to exit. Call after stdout has been drained.
    pub async fn wait(mut self) -> Result<(), ToolError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|source| ToolError::Io {
                tool: self.tool.clone(),
                source,
            })?;

        let stderr_tail = self.stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(ToolError::NonZeroExit {
                tool: self.tool,
                status,
                stderr_tail: tail(&stderr_tail),
            });
        }
        Ok(())
    }
}

/// Spawn a tool whose stdout will be read line by line.
pub fn spawn_streaming(mut cmd: Command) -> Result<StreamingChild, ToolError> {
    let tool = tool_name(&cmd);

    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ToolError::Spawn {
            tool: tool.clone(),
            source,
        })?;

    // Both pipes were requested above; take() cannot fail.
    let stdout = child.stdout.take().expect("stdout piped");
    let stderr = child.stderr.take().expect("stderr piped");

    let stderr_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        while let Ok(Some(line)) = lines.next_line().await {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        tail
    });

    Ok(StreamingChild {
        tool,
        child,
        stdout_lines: BufReader::new(stdout).lines(),
        stderr_task,
    })
}
