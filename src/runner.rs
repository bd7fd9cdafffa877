//! Task execution for a resolved plan.
//!
//! Local plans spawn `plugin_repackaging.sh` on the host with the output
//! directory as working directory. Container plans go through
//! [`ArtifactStager`]. Neither path retries.

use crate::docker::{ArtifactStager, DaemonClient, Platform};
use crate::error::{ExecutionError, Result};
use crate::process::{self, CombinedLog, LineSink, StreamError};
use crate::resolver::{ExecutionPlan, Strategy};
use crate::task::{OutputPattern, RepackageTask};
use crate::tools::HostTools;
use crate::RepackageConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::process::Command;

/// Margin for filesystems with coarse modification times
const MTIME_SLACK: Duration = Duration::from_secs(2);

/// How a local run's stdio is wired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Attached to the caller's terminal, so the script can prompt
    #[default]
    Inherit,
    /// Piped, forwarded line by line and recorded
    Capture,
}

/// Result of one task run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
    /// Always true; failures are returned as errors
    pub success: bool,
    /// Where the task ran
    pub strategy: Strategy,
    /// stdout and stderr lines in arrival order (empty when inherited)
    pub combined_output: Vec<String>,
    /// Output artifacts on the host
    pub artifacts: Vec<PathBuf>,
    /// Non-fatal problems worth showing to the user
    pub warnings: Vec<String>,
}

/// Runs tasks according to an [`ExecutionPlan`]
pub struct TaskRunner<'a, D> {
    client: &'a D,
    tools: &'a HostTools,
    output_dir: PathBuf,
    work_dir: String,
    timeout: Option<Duration>,
    mode: OutputMode,
}

impl<'a, D: DaemonClient> TaskRunner<'a, D> {
    /// Builds a runner from the crate configuration
    pub fn new(client: &'a D, tools: &'a HostTools, config: &RepackageConfig) -> Self {
        Self {
            client,
            tools,
            output_dir: config.output_dir.clone(),
            work_dir: config.container_work_dir.clone(),
            timeout: config.task_timeout,
            mode: config.output_mode,
        }
    }

    /// Runs `task` where `plan` says, forwarding output lines to `sink`.
    pub async fn run(
        &self,
        plan: &ExecutionPlan,
        task: &RepackageTask,
        sink: &dyn LineSink,
    ) -> Result<TaskOutcome> {
        match &plan.strategy {
            Strategy::Local => self.run_local(task, sink).await,
            Strategy::Container { container_id } => {
                self.run_in_container(container_id, task, sink).await
            }
        }
    }

    async fn run_local(&self, task: &RepackageTask, sink: &dyn LineSink) -> Result<TaskOutcome> {
        let mut warnings = Vec::new();
        if let Some(warning) = self.host_helper_warning() {
            log::warn!("{}", warning);
            warnings.push(warning);
        }

        self.tools.ensure_executable()?;

        let args = task.command_args();
        let command_line = format!("{} {}", self.tools.entry_point().display(), args.join(" "));
        log::info!("Executing locally: {}", command_line);

        let mut command = Command::new(self.tools.entry_point());
        command.args(&args).current_dir(&self.output_dir);

        let started = SystemTime::now();
        let combined = CombinedLog::forwarding(sink);
        let status = match self.mode {
            OutputMode::Inherit => process::run_inherited(command, self.timeout).await,
            OutputMode::Capture => process::run_streaming(command, &combined, self.timeout).await,
        };

        let status = status.map_err(|e| match e {
            StreamError::Spawn(e) | StreamError::Wait(e) => ExecutionError::SpawnFailed {
                command: command_line.clone(),
                reason: e.to_string(),
            },
            StreamError::TimedOut(limit) => ExecutionError::TimedOut {
                command: command_line.clone(),
                secs: limit.as_secs(),
            },
        })?;
        if !status.success() {
            return Err(ExecutionError::NonZeroExit {
                command: command_line,
                code: process::exit_code(&status),
            }
            .into());
        }

        let pattern = task.host_output_pattern();
        let artifacts = scan_output_dir(&self.output_dir, &pattern, started)?;
        if artifacts.is_empty() {
            warnings.push(format!(
                "No packaged file matching {} found in {}",
                pattern,
                self.output_dir.display()
            ));
        }

        Ok(TaskOutcome {
            success: true,
            strategy: Strategy::Local,
            combined_output: combined.into_lines(),
            artifacts,
            warnings,
        })
    }

    async fn run_in_container(
        &self,
        container: &str,
        task: &RepackageTask,
        sink: &dyn LineSink,
    ) -> Result<TaskOutcome> {
        log::info!("Executing in Docker container: {}", container);
        let stager = ArtifactStager::with_work_dir(self.client, self.work_dir.clone());

        let staged = stager.stage(container, task, self.tools).await?;
        let combined = CombinedLog::forwarding(sink);
        stager.run(container, &staged, &combined).await?;
        let output = stager.retrieve(container, task, &self.output_dir).await?;

        let warnings = output
            .ignored_matches
            .iter()
            .map(|ignored| {
                format!(
                    "Multiple files match {}, using {} and ignoring {}",
                    output.match_pattern, output.resolved_container_path, ignored
                )
            })
            .collect();

        Ok(TaskOutcome {
            success: true,
            strategy: Strategy::Container {
                container_id: container.to_string(),
            },
            combined_output: combined.into_lines(),
            artifacts: vec![output.local_destination],
            warnings,
        })
    }

    fn host_helper_warning(&self) -> Option<String> {
        let binary = match Platform::host().helper_binary_name() {
            Ok(binary) => binary,
            Err(e) => return Some(format!("No helper binary for this host: {}", e)),
        };
        self.tools
            .find_helper(&binary)
            .err()
            .map(|e| format!("{}; the script may fail", e))
    }
}

/// Files in `dir` matching `pattern` and modified since `since`, sorted by name.
pub fn scan_output_dir(
    dir: &Path,
    pattern: &OutputPattern,
    since: SystemTime,
) -> std::io::Result<Vec<PathBuf>> {
    let threshold = since.checked_sub(MTIME_SLACK).unwrap_or(since);
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let name = entry.file_name();
        if !pattern.matches(&name.to_string_lossy()) {
            continue;
        }
        if metadata.modified().is_ok_and(|m| m < threshold) {
            log::debug!("Ignoring stale artifact {}", entry.path().display());
            continue;
        }
        found.push(entry.path());
    }
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_output_dir_filters_by_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("widget-linux-amd64-offline.difypkg"), "x").unwrap();
        std::fs::write(dir.path().join("gadget-offline.difypkg"), "x").unwrap();
        std::fs::write(dir.path().join("widget.difypkg"), "x").unwrap();

        let task = RepackageTask::Local {
            path: PathBuf::from("/in/widget.difypkg"),
        };
        let found = scan_output_dir(
            dir.path(),
            &task.host_output_pattern(),
            SystemTime::now() - Duration::from_secs(60),
        )
        .unwrap();
        assert_eq!(found, vec![dir.path().join("widget-linux-amd64-offline.difypkg")]);
    }

    #[test]
    fn test_scan_output_dir_keeps_original_local_name() {
        let dir = tempfile::tempdir().unwrap();
        let produced = dir.path().join("My Plugin (v2)-linux-amd64-offline.difypkg");
        std::fs::write(&produced, "x").unwrap();
        std::fs::write(dir.path().join("My_Plugin_v2-linux-amd64-offline.difypkg"), "x").unwrap();

        let task = RepackageTask::Local {
            path: PathBuf::from("/in/My Plugin (v2).difypkg"),
        };
        let found = scan_output_dir(
            dir.path(),
            &task.host_output_pattern(),
            SystemTime::now() - Duration::from_secs(60),
        )
        .unwrap();
        assert_eq!(found, vec![produced]);
    }

    #[test]
    fn test_scan_output_dir_skips_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("widget-offline.difypkg"), "x").unwrap();

        let task = RepackageTask::Local {
            path: PathBuf::from("/in/widget.difypkg"),
        };
        let found = scan_output_dir(
            dir.path(),
            &task.host_output_pattern(),
            SystemTime::now() + Duration::from_secs(3600),
        )
        .unwrap();
        assert!(found.is_empty());
    }
}
