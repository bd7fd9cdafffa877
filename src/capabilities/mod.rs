//! Host capability detection and mode recommendation.
//!
//! [`detect_capabilities`] runs the [`probe::ProbeSet`] and turns the raw
//! results into a [`CapabilityReport`]. A fresh report is built per request;
//! nothing is cached.
//!
//! # Recommendation table
//!
//! Evaluated top to bottom, first match wins:
//!
//! 1. Docker installed and the daemon answers: every mode is recommended.
//! 2. Python 3, pip and unzip all present: `local` is recommended; the
//!    download modes are recommended when the network is reachable and
//!    disabled otherwise.
//! 3. Otherwise the download modes are disabled and one message is emitted per
//!    missing prerequisite. `local` stays recommended so the two sets always
//!    cover every mode.

pub mod probe;

use crate::task::TaskMode;
use probe::{ProbeResults, ProbeSet};
use serde::Serialize;
use std::collections::BTreeSet;

/// Snapshot of what this host can do, plus the derived recommendation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityReport {
    /// A docker CLI binary was found
    pub docker_available: bool,
    /// The docker daemon answered `docker info`
    pub docker_running: bool,
    /// At least one running plugin container
    pub plugin_container_running: bool,
    /// Running containers whose name contains "plugin", in daemon order
    #[serde(rename = "pluginContainers")]
    pub matching_containers: Vec<String>,
    /// A plugin daemon image exists, or a container was created from one
    pub daemon_image_present: bool,
    /// A Python 3 runtime answered
    pub runtime_available: bool,
    /// Reported runtime version, empty when unavailable
    pub runtime_version: String,
    /// The runtime is 3.12 or newer
    pub runtime_ideal: bool,
    /// pip answered
    pub package_manager_available: bool,
    /// unzip answered
    pub archive_tool_available: bool,
    /// Reachability heuristic succeeded
    pub network_available: bool,
    /// Modes that can be used on this host
    #[serde(rename = "recommendedModes")]
    pub recommended: BTreeSet<TaskMode>,
    /// Modes that cannot be used on this host
    #[serde(rename = "disabledModes")]
    pub disabled: BTreeSet<TaskMode>,
    /// Human-readable rationale, in evaluation order
    #[serde(rename = "warningMessages")]
    pub messages: Vec<String>,
}

/// Probes the host with the default probe set and builds a report.
pub fn detect_capabilities() -> CapabilityReport {
    detect_capabilities_with(&ProbeSet::default())
}

/// Probes the host with `probes` and builds a report.
pub fn detect_capabilities_with(probes: &ProbeSet) -> CapabilityReport {
    CapabilityReport::from_probes(probes.run())
}

impl CapabilityReport {
    /// Applies the recommendation table to raw probe results.
    pub fn from_probes(results: ProbeResults) -> Self {
        let mut recommended = BTreeSet::new();
        let mut disabled = BTreeSet::new();
        let mut messages = Vec::new();

        let runtime_available = results.runtime.is_some();
        let runtime_ideal = results.runtime.as_ref().is_some_and(|r| r.ideal);
        let network_modes = TaskMode::ALL.into_iter().filter(|m| m.requires_network());

        if results.docker_available && results.docker_running {
            recommended.extend(TaskMode::ALL);
            messages.push("✅ Docker is available, all modes are recommended".to_string());
            if results.plugin_containers.is_empty() {
                messages.push("💡 No running plugin daemon container detected".to_string());
            }
        } else if runtime_available
            && results.package_manager_available
            && results.archive_tool_available
        {
            recommended.insert(TaskMode::Local);
            if results.network_available {
                recommended.extend(network_modes);
                messages.push(
                    "⚠️ Local Python environment is available, but Docker is recommended for better compatibility"
                        .to_string(),
                );
            } else {
                disabled.extend(network_modes);
                messages.push("⚠️ Network is unavailable, only local file mode can be used".to_string());
            }
        } else {
            recommended.insert(TaskMode::Local);
            disabled.extend(network_modes);
            if !runtime_available {
                messages.push("❌ Python 3.12+ not detected, installing Docker is recommended".to_string());
            }
            if !results.package_manager_available {
                messages.push("❌ pip package manager not detected".to_string());
            }
            if !results.archive_tool_available {
                messages.push("❌ unzip tool not detected".to_string());
            }
            if results.docker_available {
                messages.push("💡 Docker is installed, please start the Docker service".to_string());
            } else {
                messages.push("💡 Install Docker for the best experience".to_string());
            }
        }

        if let Some(runtime) = results.runtime.as_ref().filter(|r| !r.ideal) {
            messages.push(format!(
                "💡 {} detected, Python 3.12+ is recommended",
                runtime.version
            ));
        }

        Self {
            docker_available: results.docker_available,
            docker_running: results.docker_running,
            plugin_container_running: !results.plugin_containers.is_empty(),
            matching_containers: results.plugin_containers,
            daemon_image_present: results.daemon_image_present,
            runtime_available,
            runtime_version: results
                .runtime
                .map(|r| r.version)
                .unwrap_or_default(),
            runtime_ideal,
            package_manager_available: results.package_manager_available,
            archive_tool_available: results.archive_tool_available,
            network_available: results.network_available,
            recommended,
            disabled,
            messages,
        }
    }

    /// Whether `mode` is usable on this host
    pub fn is_recommended(&self, mode: TaskMode) -> bool {
        self.recommended.contains(&mode)
    }

    /// Whether `mode` has been ruled out on this host
    pub fn is_disabled(&self, mode: TaskMode) -> bool {
        self.disabled.contains(&mode)
    }
}

#[cfg(test)]
mod tests {
    use super::probe::RuntimeInfo;
    use super::*;

    fn python(minor: u32) -> Option<RuntimeInfo> {
        Some(RuntimeInfo {
            command: "python3".to_string(),
            version: format!("Python 3.{}.0", minor),
            ideal: minor >= 12,
        })
    }

    fn assert_partition(report: &CapabilityReport) {
        assert!(report.recommended.is_disjoint(&report.disabled));
        for mode in TaskMode::ALL {
            assert!(
                report.is_recommended(mode) || report.is_disabled(mode),
                "{} is neither recommended nor disabled",
                mode
            );
        }
    }

    #[test]
    fn test_docker_running_recommends_everything() {
        let report = CapabilityReport::from_probes(ProbeResults {
            docker_available: true,
            docker_running: true,
            plugin_containers: vec!["docker-plugin_daemon-1".to_string()],
            ..Default::default()
        });
        assert_eq!(report.recommended.len(), 3);
        assert!(report.disabled.is_empty());
        assert!(report.plugin_container_running);
        assert_partition(&report);
    }

    #[test]
    fn test_local_toolchain_without_network() {
        let report = CapabilityReport::from_probes(ProbeResults {
            runtime: python(12),
            package_manager_available: true,
            archive_tool_available: true,
            network_available: false,
            ..Default::default()
        });
        assert!(report.is_recommended(TaskMode::Local));
        assert!(report.is_disabled(TaskMode::Market));
        assert!(report.is_disabled(TaskMode::Github));
        assert_partition(&report);
    }

    #[test]
    fn test_missing_prerequisites_emit_one_message_each() {
        let report = CapabilityReport::from_probes(ProbeResults {
            docker_available: true,
            docker_running: false,
            runtime: python(11),
            package_manager_available: false,
            archive_tool_available: false,
            network_available: true,
            ..Default::default()
        });
        assert!(report.is_disabled(TaskMode::Market));
        assert!(report.is_disabled(TaskMode::Github));
        assert!(report.messages.iter().any(|m| m.contains("pip")));
        assert!(report.messages.iter().any(|m| m.contains("unzip")));
        assert!(report.messages.iter().any(|m| m.contains("start the Docker service")));
        assert!(!report.messages.iter().any(|m| m.contains("not detected, installing")));
        assert!(report.messages.iter().any(|m| m.contains("Python 3.11.0 detected")));
        assert_partition(&report);
    }

    #[test]
    fn test_old_python_is_only_a_hint() {
        let report = CapabilityReport::from_probes(ProbeResults {
            runtime: python(8),
            package_manager_available: true,
            archive_tool_available: true,
            network_available: true,
            ..Default::default()
        });
        assert!(report.runtime_available);
        assert!(!report.runtime_ideal);
        assert_eq!(report.recommended.len(), 3);
    }

    #[test]
    fn test_report_json_field_names() {
        let report = CapabilityReport::from_probes(ProbeResults::default());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["dockerAvailable"], false);
        assert_eq!(json["recommendedModes"], serde_json::json!(["local"]));
        assert_eq!(json["disabledModes"], serde_json::json!(["market", "github"]));
        assert!(json["warningMessages"].is_array());
        assert!(json["pluginContainers"].is_array());
    }
}
