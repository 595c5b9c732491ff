// repotools-core/src/invoker.rs

//! Bounded execution of external commands.
//!
//! Every tool runs its child processes through [`Invoker::invoke`]. A call
//! spawns exactly one process, captures its standard output and standard error
//! in full, and waits at most for the request's timeout. Whatever happens, the
//! caller gets an [`InvocationResult`] back: timeouts and launch failures are
//! folded into the same shape as a completed process, tagged with an
//! [`Outcome`] and a sentinel exit status.
//!
//! On unix the child leads its own process group. A timeout kills the whole
//! group, so scripts cannot leave long-running descendants behind.
//!
//! The invoker does not interpret exit codes. A non-zero status from a child
//! that ran to completion is reported as [`Outcome::Completed`].

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit status reported when the child outlived its timeout and was killed.
pub const TIMEOUT_EXIT_STATUS: i32 = -1;
/// Exit status reported when the child could not be started at all.
pub const LAUNCH_FAILURE_EXIT_STATUS: i32 = -2;

#[cfg(unix)]
const GROUP_KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// The command to run: either an argument vector or a line for the platform shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Program followed by its arguments. No shell is involved.
    Argv(Vec<String>),
    /// A line interpreted by `sh -c` (`cmd /C` on Windows).
    Shell(String),
}

impl CommandLine {
    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandLine::Argv(args.into_iter().map(Into::into).collect())
    }

    pub fn shell(line: impl Into<String>) -> Self {
        CommandLine::Shell(line.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CommandLine::Argv(args) => args.first().map_or(true, |p| p.trim().is_empty()),
            CommandLine::Shell(line) => line.trim().is_empty(),
        }
    }

    /// Splits the command into the program to spawn and its arguments.
    fn program_and_args(&self) -> Option<(String, Vec<String>)> {
        if self.is_empty() {
            return None;
        }
        match self {
            CommandLine::Argv(args) => Some((args[0].clone(), args[1..].to_vec())),
            CommandLine::Shell(line) => {
                let (shell, flag) = if cfg!(target_os = "windows") {
                    ("cmd", "/C")
                } else {
                    ("sh", "-c")
                };
                Some((shell.to_string(), vec![flag.to_string(), line.clone()]))
            }
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLine::Argv(args) => write!(f, "{}", args.join(" ")),
            CommandLine::Shell(line) => write!(f, "sh -c '{}'", line),
        }
    }
}

/// One bounded execution of an external command.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub command: CommandLine,
    /// Relative paths resolve against the invoker's project root; `None` is the root itself.
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl InvocationRequest {
    pub fn new(command: CommandLine, timeout: Duration) -> Self {
        Self {
            command,
            working_dir: None,
            timeout,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    TimedOut,
    LaunchFailed,
}

/// The captured result of an invocation.
///
/// For [`Outcome::TimedOut`] and [`Outcome::LaunchFailed`], `status` holds the
/// matching sentinel, `stdout` is empty and `stderr` describes the failure.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
    pub outcome: Outcome,
}

impl InvocationResult {
    /// True when the child ran to completion with status 0.
    pub fn success(&self) -> bool {
        self.outcome == Outcome::Completed && self.status == 0
    }

    fn timed_out(timeout: Duration) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("Command timed out after {:?}", timeout),
            status: TIMEOUT_EXIT_STATUS,
            outcome: Outcome::TimedOut,
        }
    }

    fn launch_failed(detail: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: detail.into(),
            status: LAUNCH_FAILURE_EXIT_STATUS,
            outcome: Outcome::LaunchFailed,
        }
    }
}

/// Runs commands relative to a fixed project root.
#[derive(Debug, Clone)]
pub struct Invoker {
    root: PathBuf,
}

impl Invoker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a request's working directory against the project root.
    pub fn resolve_dir(&self, dir: Option<&Path>) -> PathBuf {
        match dir {
            None => self.root.clone(),
            Some(d) if d.is_absolute() => d.to_path_buf(),
            Some(d) => self.root.join(d),
        }
    }

    /// Executes the request and waits for it, at most for `request.timeout`.
    ///
    /// On timeout the child is killed and any output it produced so far is
    /// discarded.
    pub async fn invoke(&self, request: &InvocationRequest) -> InvocationResult {
        let Some((program, args)) = request.command.program_and_args() else {
            warn!("Refusing to invoke an empty command");
            return InvocationResult::launch_failed("Cannot invoke an empty command");
        };
        if request.timeout.is_zero() {
            warn!(command = %request.command, "Refusing to invoke a command with a zero timeout");
            return InvocationResult::launch_failed("Timeout must be greater than zero");
        }

        let cwd = self.resolve_dir(request.working_dir.as_deref());
        if !cwd.is_dir() {
            warn!(command = %request.command, cwd = ?cwd, "Working directory does not exist");
            return InvocationResult::launch_failed(format!(
                "Working directory does not exist: {}",
                cwd.display()
            ));
        }

        debug!(
            command = %request.command,
            cwd = ?cwd,
            timeout = ?request.timeout,
            "Invoking command"
        );

        let mut command = Command::new(&program);
        command
            .args(&args)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The child leads its own process group so a timeout reaches its descendants.
        #[cfg(unix)]
        command.process_group(0);
        let child = command.spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %request.command, error = %e, "Failed to spawn command process");
                return InvocationResult::launch_failed(format!(
                    "Failed to launch '{}': {}",
                    program, e
                ));
            }
        };

        let pid = child.id();

        // Dropping the pending future drops the child, which kills it.
        let output = match tokio::time::timeout(request.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(command = %request.command, error = %e, "Failed to collect command output");
                return InvocationResult::launch_failed(format!(
                    "Failed to collect output of '{}': {}",
                    program, e
                ));
            }
            Err(_) => {
                warn!(command = %request.command, timeout = ?request.timeout, "Command timed out");
                #[cfg(unix)]
                if let Some(pid) = pid {
                    kill_process_group(pid).await;
                }
                return InvocationResult::timed_out(request.timeout);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let status = exit_code(output.status);

        debug!(
            "Command exit status: {}\nStdout preview (first 3 lines):\n{}\nStderr preview (first 3 lines):\n{}",
            status,
            stdout.lines().take(3).collect::<Vec<_>>().join("\n"),
            stderr.lines().take(3).collect::<Vec<_>>().join("\n")
        );

        InvocationResult {
            stdout,
            stderr,
            status,
            outcome: Outcome::Completed,
        }
    }
}

/// Sends SIGKILL to the process group led by `pid`.
#[cfg(unix)]
async fn kill_process_group(pid: u32) {
    let group = format!("-{}", pid);
    let kill = Command::new("kill")
        .args(["-s", "KILL", "--", group.as_str()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match tokio::time::timeout(GROUP_KILL_TIMEOUT, kill).await {
        Ok(Ok(status)) => debug!(pid, killed = status.success(), "Signalled process group"),
        Ok(Err(e)) => warn!(pid, error = %e, "Failed to run kill for the process group"),
        Err(_) => warn!(pid, "Timed out signalling the process group"),
    }
}

/// Real exit code, or `128 + signal` for a child killed by a signal.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
