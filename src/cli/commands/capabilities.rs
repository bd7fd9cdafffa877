//! The `capabilities` command.

use crate::capabilities::probe::ProbeSet;
use crate::capabilities::{CapabilityReport, detect_capabilities_with};
use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::task::TaskMode;

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Probes the host and prints the report
pub(super) async fn execute_capabilities(json: bool, config: &RuntimeConfig) -> Result<i32> {
    let probes = ProbeSet::new(config.settings().network_host.clone());
    let report = tokio::task::spawn_blocking(move || detect_capabilities_with(&probes))
        .await
        .map_err(std::io::Error::other)?;

    if json || config.is_capture() {
        let _ = config
            .output()
            .json(&serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, config);
    }
    Ok(0)
}

fn print_report(report: &CapabilityReport, config: &RuntimeConfig) {
    let _ = config.output().section("Host capabilities");
    config.indent(&format!(
        "Docker installed: {}, running: {}",
        yes_no(report.docker_available),
        yes_no(report.docker_running)
    ));
    if report.matching_containers.is_empty() {
        config.indent("Plugin containers: none");
    } else {
        config.indent(&format!(
            "Plugin containers: {}",
            report.matching_containers.join(", ")
        ));
    }
    config.indent(&format!(
        "Plugin daemon image: {}",
        yes_no(report.daemon_image_present)
    ));
    if report.runtime_available {
        config.indent(&format!("Python: {}", report.runtime_version));
    } else {
        config.indent("Python: not found");
    }
    config.indent(&format!(
        "pip: {}, unzip: {}, network: {}",
        yes_no(report.package_manager_available),
        yes_no(report.archive_tool_available),
        yes_no(report.network_available)
    ));

    let _ = config.output().section("Modes");
    for mode in TaskMode::ALL {
        let state = if report.is_recommended(mode) {
            "recommended"
        } else {
            "disabled"
        };
        config.indent(&format!("{:<8} {}", mode.as_str(), state));
    }

    if !report.messages.is_empty() {
        config.println("");
        for message in &report.messages {
            config.println(message);
        }
    }
}
