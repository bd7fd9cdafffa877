//! The `local`, `market` and `github` commands.

use crate::capabilities::CapabilityReport;
use crate::capabilities::probe::{self, ProbeSet};
use crate::cli::{Command, ConsoleSink, RuntimeConfig, StdinConfirm};
use crate::docker::{ContainerLocator, DockerCli};
use crate::error::{CliError, Result};
use crate::resolver::{ExecutionResolver, Strategy};
use crate::runner::{TaskOutcome, TaskRunner};
use crate::task::RepackageTask;
use crate::tools::HostTools;

/// Builds the task a subcommand describes
pub(super) fn task_from_command(command: &Command) -> Result<RepackageTask> {
    let task = match command {
        Command::Local { file } => RepackageTask::local(file)?,
        Command::Market {
            author,
            name,
            version,
        } => RepackageTask::market(author, name, version)?,
        Command::Github {
            repository,
            release,
            asset,
        } => RepackageTask::github(repository, release, asset)?,
        Command::Capabilities { .. } => {
            return Err(CliError::InvalidArguments {
                reason: "capabilities is not a repackaging task".to_string(),
            }
            .into());
        }
    };
    Ok(task)
}

/// Resolves where the task runs, runs it and reports the outcome
pub(super) async fn execute_repackage(command: &Command, config: &RuntimeConfig) -> Result<i32> {
    let settings = config.settings();
    let task = task_from_command(command)?;
    let tools = HostTools::locate(settings.script_dir.as_deref())?;
    config.verbose_println(&format!("Using {}", tools.entry_point().display()));

    config.progress_println("Detecting execution environment...");
    let probes = ProbeSet::new(settings.network_host.clone());
    let report = tokio::task::spawn_blocking(move || {
        CapabilityReport::from_probes(probes.run_daemon_checks())
    })
    .await
    .map_err(std::io::Error::other)?;
    let inside_container = probe::inside_container();

    let client = DockerCli::from_host().with_exec_timeout(settings.task_timeout);
    let locator = ContainerLocator::new(&client);
    let resolver = ExecutionResolver::new(settings.resolver_config(), StdinConfirm);
    let plan = resolver
        .resolve(settings.preference, inside_container, &report, &locator)
        .await?;

    match &plan.strategy {
        Strategy::Local if plan.requires_confirmation => {
            config.warning_println("Executing locally without the plugin daemon container")
        }
        Strategy::Local => config.progress_println("Executing locally"),
        Strategy::Container { container_id } => {
            config.progress_println(&format!("Executing in Docker container: {}", container_id))
        }
    }

    let sink = ConsoleSink::new(config.is_capture(), !config.echo_task_output());
    let runner = TaskRunner::new(&client, &tools, settings);
    let outcome = runner.run(&plan, &task, &sink).await?;

    if config.is_capture() {
        let _ = config
            .output()
            .json(&serde_json::to_string_pretty(&outcome)?);
    } else {
        report_outcome(&outcome, config);
    }
    Ok(0)
}

fn report_outcome(outcome: &TaskOutcome, config: &RuntimeConfig) {
    for warning in &outcome.warnings {
        config.warning_println(warning);
    }
    config.success_println("Repackaging completed");
    for artifact in &outcome.artifacts {
        config.indent(&artifact.display().to_string());
    }
}
