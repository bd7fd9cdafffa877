//! Staging protocol for running a task inside a container.
//!
//! `stage` copies the entry point, the platform's helper binary and any local
//! input into the working directory; `run` executes the entry point there;
//! `retrieve` copies the single output artifact back. Every step fails the
//! task on error. Nothing is cleaned up afterwards, and the working directory
//! is never assumed to start empty.

use super::client::DaemonClient;
use super::platform::Platform;
use crate::error::{DaemonError, RepackageError, RetrievalError, StagingError};
use crate::process::LineSink;
use crate::task::RepackageTask;
use crate::tools::HostTools;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Working directory inside the container
pub const CONTAINER_WORK_DIR: &str = "/tmp/repackage";

/// One file placed in the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedArtifact {
    /// Name on the host
    pub original_name: String,
    /// Name inside the container
    pub sanitized_name: String,
    /// Absolute path inside the container
    pub container_path: String,
}

/// Everything `run` needs after a successful `stage`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedTask {
    /// Entry point path inside the container
    pub entry_point: String,
    /// Positional arguments, rewritten to in-container paths
    pub args: Vec<String>,
    /// Platform reported by the container
    pub platform: Platform,
    /// Files copied in, in copy order
    pub artifacts: Vec<StagedArtifact>,
}

impl StagedTask {
    /// Full command line for `exec`
    pub fn command(&self) -> Vec<String> {
        let mut command = vec![self.entry_point.clone()];
        command.extend(self.args.iter().cloned());
        command
    }
}

/// The retrieved output of a container task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputArtifact {
    /// Pattern used to find the artifact
    pub match_pattern: String,
    /// Where the artifact was inside the container
    pub resolved_container_path: String,
    /// Where it was copied to on the host
    pub local_destination: PathBuf,
    /// Other matches that were ignored, in daemon order
    pub ignored_matches: Vec<String>,
}

/// Joins container paths with `/` regardless of the host OS
fn container_join(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Runs the staging protocol against one daemon
pub struct ArtifactStager<'a, D> {
    client: &'a D,
    work_dir: String,
}

impl<'a, D: DaemonClient> ArtifactStager<'a, D> {
    /// Stages into [`CONTAINER_WORK_DIR`]
    pub fn new(client: &'a D) -> Self {
        Self::with_work_dir(client, CONTAINER_WORK_DIR)
    }

    /// Stages into `work_dir`
    pub fn with_work_dir(client: &'a D, work_dir: impl Into<String>) -> Self {
        Self {
            client,
            work_dir: work_dir.into(),
        }
    }

    async fn copy_in(
        &self,
        container: &str,
        host_path: &Path,
        container_path: &str,
    ) -> Result<(), StagingError> {
        log::info!("Copying {} to container: {}", host_path.display(), container_path);
        self.client
            .copy_to(container, host_path, container_path)
            .await
            .map_err(|source| StagingError::CopyFailed {
                file: host_path.to_path_buf(),
                container: container.to_string(),
                source,
            })
    }

    /// Copies the entry point, helper binary and local input into the
    /// container and rewrites the task arguments to point at them.
    pub async fn stage(
        &self,
        container: &str,
        task: &RepackageTask,
        tools: &HostTools,
    ) -> Result<StagedTask, RepackageError> {
        let mkdir = vec!["mkdir".to_string(), "-p".to_string(), self.work_dir.clone()];
        self.client
            .exec(container, &mkdir)
            .await
            .map_err(|source| StagingError::CreateWorkDir {
                container: container.to_string(),
                path: self.work_dir.clone(),
                source,
            })?;

        let mut artifacts = Vec::new();

        let script_name = file_name(tools.entry_point());
        let entry_point = container_join(&self.work_dir, &script_name);
        self.copy_in(container, tools.entry_point(), &entry_point).await?;
        artifacts.push(StagedArtifact {
            original_name: script_name.clone(),
            sanitized_name: script_name,
            container_path: entry_point.clone(),
        });

        let platform = Platform::of_container(self.client, container).await?;
        let helper_name = platform.helper_binary_name()?;
        let helper_host = tools.find_helper(&helper_name)?;
        let helper_path = container_join(&self.work_dir, &helper_name);
        self.copy_in(container, &helper_host, &helper_path).await?;
        artifacts.push(StagedArtifact {
            original_name: file_name(&helper_host),
            sanitized_name: helper_name,
            container_path: helper_path.clone(),
        });

        let chmod = vec![
            "chmod".to_string(),
            "+x".to_string(),
            helper_path.clone(),
            entry_point.clone(),
        ];
        self.client
            .exec(container, &chmod)
            .await
            .map_err(|source| StagingError::ChmodFailed {
                container: container.to_string(),
                path: helper_path,
                source,
            })?;

        let mut args = task.command_args();
        if let (RepackageTask::Local { path }, Some(sanitized)) = (task, task.staged_input_name()) {
            let input_path = container_join(&self.work_dir, &sanitized);
            self.copy_in(container, path, &input_path).await?;
            artifacts.push(StagedArtifact {
                original_name: file_name(path),
                sanitized_name: sanitized,
                container_path: input_path.clone(),
            });
            if let Some(arg) = args.get_mut(1) {
                *arg = input_path;
            }
        }

        Ok(StagedTask {
            entry_point,
            args,
            platform,
            artifacts,
        })
    }

    /// Executes the staged entry point, forwarding output lines to `sink`.
    pub async fn run(
        &self,
        container: &str,
        staged: &StagedTask,
        sink: &dyn LineSink,
    ) -> Result<(), StagingError> {
        let command = staged.command();
        let result = self.client.exec_streaming(container, &command, sink).await;
        if let Err(DaemonError::TimedOut { .. }) = &result {
            self.kill_task(container).await;
        }
        result.map_err(|source| StagingError::ExecFailed {
            container: container.to_string(),
            command: command.join(" "),
            source,
        })
    }

    /// Kills whatever still runs from the working directory.
    ///
    /// Killing the local `docker exec` client leaves the exec'd process tree
    /// alive inside the container.
    async fn kill_task(&self, container: &str) {
        let pattern = format!("{}/", self.work_dir.trim_end_matches('/'));
        log::warn!("Killing task processes matching {} in container {}", pattern, container);
        let args = vec![
            "pkill".to_string(),
            "-KILL".to_string(),
            "-f".to_string(),
            pattern,
        ];
        if let Err(e) = self.client.exec(container, &args).await {
            // pkill exits 1 when nothing matched
            log::debug!("In-container kill in {}: {}", container, e);
        }
    }

    /// Finds the task's output artifact and copies it into `dest_dir`.
    ///
    /// Zero matches fail; with several, the first in daemon order is used and
    /// the rest are reported in [`OutputArtifact::ignored_matches`].
    pub async fn retrieve(
        &self,
        container: &str,
        task: &RepackageTask,
        dest_dir: &Path,
    ) -> Result<OutputArtifact, RetrievalError> {
        let pattern = task.output_pattern();
        let find = vec![
            "find".to_string(),
            self.work_dir.clone(),
            "-type".to_string(),
            "f".to_string(),
        ];
        let listing = self
            .client
            .exec(container, &find)
            .await
            .map_err(|source| RetrievalError::SearchFailed {
                container: container.to_string(),
                source,
            })?;

        let mut matches = listing
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && pattern.matches(base_name(line)))
            .map(str::to_string);

        let Some(selected) = matches.next() else {
            return Err(RetrievalError::NoOutput {
                pattern: pattern.to_string(),
                location: format!("container {}:{}", container, self.work_dir),
            });
        };
        let ignored_matches: Vec<String> = matches.collect();
        if !ignored_matches.is_empty() {
            log::warn!(
                "Found {} files matching {}, using {}",
                ignored_matches.len() + 1,
                pattern,
                selected
            );
        }

        log::info!("Copying {} from container to {}", selected, dest_dir.display());
        self.client
            .copy_from(container, &selected, dest_dir)
            .await
            .map_err(|source| RetrievalError::CopyBackFailed {
                container: container.to_string(),
                file: selected.clone(),
                source,
            })?;

        Ok(OutputArtifact {
            match_pattern: pattern.to_string(),
            local_destination: dest_dir.join(base_name(&selected)),
            resolved_container_path: selected,
            ignored_matches,
        })
    }
}
