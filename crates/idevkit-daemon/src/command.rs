//! One-shot external command invocation
//!
//! Runs a device tool to completion, capturing stdout and stderr, and maps
//! the exit status (or an exceeded timeout) into a [`CommandOutcome`].
//! Launch failures are the only thing reported through `Err`.

use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use idevkit_core::prelude::*;

/// A single invocation: program, ordered arguments and an optional timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// How a command ended. Produced exactly once per [`run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Exit status 0
    Success { stdout: String },

    /// Non-zero exit. `code` is `None` when the process was ended by a signal.
    Failure {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The timeout elapsed; the process was killed and its output discarded
    TimedOut,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success { .. })
    }

    /// Turn anything but `Success` into the matching [`Error`].
    ///
    /// For operations where a non-zero exit has no business meaning.
    pub fn into_stdout(self, spec: &CommandSpec) -> Result<String> {
        match self {
            CommandOutcome::Success { stdout } => Ok(stdout),
            CommandOutcome::Failure {
                code,
                stdout,
                stderr,
            } => Err(Error::CommandFailed {
                program: spec.program.clone(),
                code,
                stdout,
                stderr,
            }),
            CommandOutcome::TimedOut => Err(Error::TimedOut {
                program: spec.program.clone(),
                timeout: spec.timeout.unwrap_or_default(),
            }),
        }
    }
}

/// Map a spawn error to [`Error::SpawnFailed`], naming the missing program.
pub(crate) fn spawn_error(program: &str, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::spawn_failed(program, "program not found in PATH")
    } else {
        Error::spawn_failed(program, e.to_string())
    }
}

/// Run `spec` to completion.
///
/// Every call owns its child process exclusively; concurrent calls share
/// nothing. When the timeout fires the child is killed and reaped before
/// this returns, so no orphan is left behind.
pub async fn run(spec: &CommandSpec) -> Result<CommandOutcome> {
    debug!("Running: {}", spec);

    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(&spec.program, e))?;

    let pid = child.id();
    trace!("{} started with PID: {:?}", spec.program, pid);

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::spawn_failed(&spec.program, "stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::spawn_failed(&spec.program, "stderr was not captured"))?;

    // Drain both pipes concurrently so a chatty stderr cannot stall the child
    let mut stdout_task = tokio::spawn(read_stream(stdout));
    let mut stderr_task = tokio::spawn(read_stream(stderr));

    // The limit covers reading the pipes too: a grandchild that inherited
    // them can keep them open after the tool itself has exited
    let finished = match spec.timeout {
        Some(limit) => timeout(
            limit,
            wait_and_collect(&mut child, &mut stdout_task, &mut stderr_task),
        )
        .await
        .ok(),
        None => Some(wait_and_collect(&mut child, &mut stdout_task, &mut stderr_task).await),
    };

    let Some(finished) = finished else {
        warn!(
            "{} timed out after {:?}, killing PID {:?}",
            spec.program,
            spec.timeout.unwrap_or_default(),
            pid
        );
        terminate(&mut child, &spec.program).await;
        stdout_task.abort();
        stderr_task.abort();
        return Ok(CommandOutcome::TimedOut);
    };
    let (status, stdout, stderr) = finished?;

    debug!("{} exited with status: {:?}", spec.program, status);
    if !stderr.is_empty() {
        debug!("{} stderr: {}", spec.program, stderr.trim_end());
    }

    if status.success() {
        Ok(CommandOutcome::Success { stdout })
    } else {
        Ok(CommandOutcome::Failure {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Kill the child and wait for the OS to reap it.
async fn terminate(child: &mut Child, program: &str) {
    if let Err(e) = child.kill().await {
        // Already exited, e.g. only a grandchild was holding the pipes
        debug!("Failed to kill {}: {}", program, e);
    }
}

async fn read_stream<R: AsyncRead + Unpin>(mut reader: R) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(buf)
}

type StreamTask = JoinHandle<std::io::Result<Vec<u8>>>;

async fn wait_and_collect(
    child: &mut Child,
    stdout_task: &mut StreamTask,
    stderr_task: &mut StreamTask,
) -> Result<(ExitStatus, String, String)> {
    let status = child.wait().await?;
    let stdout = collect(stdout_task).await?;
    let stderr = collect(stderr_task).await?;
    Ok((status, stdout, stderr))
}

async fn collect(task: &mut StreamTask) -> Result<String> {
    let bytes = task.await.map_err(std::io::Error::other)??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
