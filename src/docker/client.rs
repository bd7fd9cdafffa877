//! Container daemon client contract and its Docker CLI implementation.
//!
//! Everything above this module talks to the daemon through [`DaemonClient`],
//! so tests can substitute an in-memory daemon.

use crate::capabilities::probe;
use crate::error::DaemonError;
use crate::process::{self, LineSink, StreamError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Timeout for short daemon commands (ps, images, cp, exec of small tools)
pub const DAEMON_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

const PS_FORMAT: &str = "{{.ID}}\t{{.Names}}\t{{.Image}}\t{{.State}}";
const IMAGES_FORMAT: &str = "{{.Repository}}\t{{.Tag}}";

/// Which containers `ps` should list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsFilter {
    /// Running containers only
    Running,
    /// Running and stopped containers
    All,
}

/// Whether a container is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningState {
    /// Running
    Running,
    /// Created, exited, paused or dead
    Stopped,
}

/// One container as reported by the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    /// Container id
    pub id: String,
    /// Container name
    pub name: String,
    /// Image the container was created from
    pub image: String,
    /// Running state
    pub state: RunningState,
}

/// One image as reported by the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    /// Repository name
    pub repository: String,
    /// Tag
    pub tag: String,
}

impl ImageSummary {
    /// `repository:tag`
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

/// Operations the repackaging core needs from a container daemon.
///
/// All listing calls preserve daemon-reported order.
#[allow(async_fn_in_trait)]
pub trait DaemonClient {
    /// Lists containers
    async fn ps(&self, filter: PsFilter) -> Result<Vec<ContainerSummary>, DaemonError>;

    /// Lists images
    async fn images(&self) -> Result<Vec<ImageSummary>, DaemonError>;

    /// Copies a host file into the container
    async fn copy_to(
        &self,
        container: &str,
        host_path: &Path,
        container_path: &str,
    ) -> Result<(), DaemonError>;

    /// Copies a container file into a host directory, keeping its name
    async fn copy_from(
        &self,
        container: &str,
        container_path: &str,
        host_dir: &Path,
    ) -> Result<(), DaemonError>;

    /// Runs a short command in the container and returns its stdout
    async fn exec(&self, container: &str, args: &[String]) -> Result<String, DaemonError>;

    /// Runs a command in the container, forwarding output lines to `sink`
    async fn exec_streaming(
        &self,
        container: &str,
        args: &[String],
        sink: &dyn LineSink,
    ) -> Result<(), DaemonError>;
}

/// [`DaemonClient`] backed by the `docker` command line
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
    command_timeout: Duration,
    exec_timeout: Option<Duration>,
}

impl DockerCli {
    /// Uses the given docker binary
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            command_timeout: DAEMON_COMMAND_TIMEOUT,
            exec_timeout: None,
        }
    }

    /// Uses the detected docker binary, or fails when none is installed
    pub fn detect() -> Result<Self, DaemonError> {
        probe::docker_binary()
            .map(Self::new)
            .ok_or(DaemonError::NotInstalled)
    }

    /// Uses the detected docker binary, falling back to `docker` on PATH
    pub fn from_host() -> Self {
        Self::detect().unwrap_or_else(|_| Self::new("docker"))
    }

    /// Bounds streamed task execution; `None` waits indefinitely
    pub fn with_exec_timeout(mut self, limit: Option<Duration>) -> Self {
        self.exec_timeout = limit;
        self
    }

    fn describe(args: &[String]) -> String {
        format!("docker {}", args.join(" "))
    }

    async fn output(&self, args: Vec<String>) -> Result<String, DaemonError> {
        let command_line = Self::describe(&args);
        log::debug!("Running: {}", command_line);

        let result = timeout(
            self.command_timeout,
            Command::new(&self.binary)
                .args(&args)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match result {
            Err(_) => Err(DaemonError::TimedOut {
                command: command_line,
                secs: self.command_timeout.as_secs(),
            }),
            Ok(Err(e)) => Err(DaemonError::CommandFailed {
                command: command_line,
                reason: e.to_string(),
            }),
            Ok(Ok(output)) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(Ok(output)) => Err(DaemonError::NonZeroExit {
                command: command_line,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

impl DaemonClient for DockerCli {
    async fn ps(&self, filter: PsFilter) -> Result<Vec<ContainerSummary>, DaemonError> {
        let mut args = owned(&["ps"]);
        match filter {
            PsFilter::Running => args.extend(owned(&["--filter", "status=running"])),
            PsFilter::All => args.push("-a".to_string()),
        }
        args.extend(owned(&["--format", PS_FORMAT]));

        let stdout = self.output(args).await?;
        Ok(stdout.lines().filter_map(parse_ps_line).collect())
    }

    async fn images(&self) -> Result<Vec<ImageSummary>, DaemonError> {
        let stdout = self
            .output(owned(&["images", "--format", IMAGES_FORMAT]))
            .await?;
        Ok(stdout.lines().filter_map(parse_images_line).collect())
    }

    async fn copy_to(
        &self,
        container: &str,
        host_path: &Path,
        container_path: &str,
    ) -> Result<(), DaemonError> {
        let args = vec![
            "cp".to_string(),
            host_path.to_string_lossy().into_owned(),
            format!("{}:{}", container, container_path),
        ];
        self.output(args).await.map(|_| ())
    }

    async fn copy_from(
        &self,
        container: &str,
        container_path: &str,
        host_dir: &Path,
    ) -> Result<(), DaemonError> {
        let args = vec![
            "cp".to_string(),
            format!("{}:{}", container, container_path),
            host_dir.to_string_lossy().into_owned(),
        ];
        self.output(args).await.map(|_| ())
    }

    async fn exec(&self, container: &str, args: &[String]) -> Result<String, DaemonError> {
        let mut full = vec!["exec".to_string(), container.to_string()];
        full.extend(args.iter().cloned());
        self.output(full).await
    }

    async fn exec_streaming(
        &self,
        container: &str,
        args: &[String],
        sink: &dyn LineSink,
    ) -> Result<(), DaemonError> {
        let mut full = vec!["exec".to_string(), container.to_string()];
        full.extend(args.iter().cloned());
        let command_line = Self::describe(&full);
        log::info!("Running: {}", command_line);

        let mut command = Command::new(&self.binary);
        command.args(&full).stdin(Stdio::null());

        match process::run_streaming(command, sink, self.exec_timeout).await {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(DaemonError::NonZeroExit {
                command: command_line,
                code: process::exit_code(&status),
                stderr: String::new(),
            }),
            Err(StreamError::TimedOut(limit)) => Err(DaemonError::TimedOut {
                command: command_line,
                secs: limit.as_secs(),
            }),
            Err(StreamError::Spawn(e)) | Err(StreamError::Wait(e)) => {
                Err(DaemonError::CommandFailed {
                    command: command_line,
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Parses one `docker ps` line in `ID\tNAMES\tIMAGE\tSTATE` form
pub(crate) fn parse_ps_line(line: &str) -> Option<ContainerSummary> {
    let mut fields = line.trim_end().split('\t');
    let id = fields.next()?.trim();
    let name = fields.next()?.trim();
    let image = fields.next()?.trim();
    let state = fields.next().unwrap_or("").trim();
    if id.is_empty() {
        return None;
    }
    Some(ContainerSummary {
        id: id.to_string(),
        name: name.to_string(),
        image: image.to_string(),
        state: if state.eq_ignore_ascii_case("running") {
            RunningState::Running
        } else {
            RunningState::Stopped
        },
    })
}

/// Parses one `docker images` line in `REPOSITORY\tTAG` form
pub(crate) fn parse_images_line(line: &str) -> Option<ImageSummary> {
    let (repository, tag) = line.trim_end().split_once('\t')?;
    if repository.trim().is_empty() {
        return None;
    }
    Some(ImageSummary {
        repository: repository.trim().to_string(),
        tag: tag.trim().to_string(),
    })
}
