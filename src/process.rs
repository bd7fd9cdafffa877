//! Child process execution with line-by-line output forwarding.
//!
//! stdout and stderr are drained concurrently and handed to a [`LineSink`] as
//! each line arrives. Lines keep their order within one stream; there is no
//! ordering guarantee across the two streams.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Child stdout
    Stdout,
    /// Child stderr
    Stderr,
}

/// Receives child output one line at a time
pub trait LineSink: Send + Sync {
    /// Called for every complete line (without the trailing newline)
    fn line(&self, stream: StreamKind, line: &str);
}

/// Discards every line
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LineSink for NullSink {
    fn line(&self, _stream: StreamKind, _line: &str) {}
}

/// Records lines in arrival order and optionally forwards them.
pub struct CombinedLog<'a> {
    lines: Mutex<Vec<String>>,
    forward: Option<&'a dyn LineSink>,
}

impl<'a> CombinedLog<'a> {
    /// Records without forwarding
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            forward: None,
        }
    }

    /// Records and forwards every line to `sink`
    pub fn forwarding(sink: &'a dyn LineSink) -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            forward: Some(sink),
        }
    }

    /// Recorded lines, in arrival order
    pub fn into_lines(self) -> Vec<String> {
        self.lines.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for CombinedLog<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSink for CombinedLog<'_> {
    fn line(&self, stream: StreamKind, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
        if let Some(forward) = self.forward {
            forward.line(stream, line);
        }
    }
}

/// Why a streamed process did not produce an exit status
#[derive(Debug)]
pub enum StreamError {
    /// Could not start
    Spawn(io::Error),
    /// Could not be waited on
    Wait(io::Error),
    /// Exceeded its timeout and was killed
    TimedOut(Duration),
}

/// Runs `command` with piped stdout/stderr, forwarding lines to `sink`.
///
/// Stdin is closed, since a background process group reading the terminal
/// would be stopped. On unix the child gets its own process group; when
/// `timeout` elapses the whole group is killed.
pub async fn run_streaming(
    mut command: Command,
    sink: &dyn LineSink,
    timeout: Option<Duration>,
) -> Result<ExitStatus, StreamError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(StreamError::Spawn)?;
    let pid = child.id();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let run = async {
        tokio::join!(
            drain_lines(stdout, StreamKind::Stdout, sink),
            drain_lines(stderr, StreamKind::Stderr, sink),
        );
        child.wait().await
    };

    let finished = match timeout {
        Some(limit) => tokio::time::timeout(limit, run).await.ok(),
        None => Some(run.await),
    };

    match finished {
        Some(status) => status.map_err(StreamError::Wait),
        None => {
            let limit = timeout.unwrap_or_default();
            log::warn!("Process timed out after {}s, killing it", limit.as_secs());
            kill_process_group(pid);
            let _ = child.kill().await;
            Err(StreamError::TimedOut(limit))
        }
    }
}

/// Runs `command` attached to the caller's stdin/stdout/stderr.
///
/// The child stays in the caller's process group so it can prompt on the
/// terminal; a timeout kills the child only.
pub async fn run_inherited(
    mut command: Command,
    timeout: Option<Duration>,
) -> Result<ExitStatus, StreamError> {
    command
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(StreamError::Spawn)?;
    let finished = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
        None => Some(child.wait().await),
    };

    match finished {
        Some(status) => status.map_err(StreamError::Wait),
        None => {
            let _ = child.kill().await;
            Err(StreamError::TimedOut(timeout.unwrap_or_default()))
        }
    }
}

async fn drain_lines<R: AsyncRead + Unpin>(
    reader: Option<R>,
    stream: StreamKind,
    sink: &dyn LineSink,
) {
    let Some(reader) = reader else {
        return;
    };
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                sink.line(stream, line.trim_end_matches(['\n', '\r']));
            }
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) {
        if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
            log::debug!("killpg({}) failed: {}", pid, e);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Exit code for messages; -1 when the process was killed by a signal
pub fn exit_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
