//! Execution target resolution.
//!
//! [`ExecutionResolver`] picks exactly one place to run a task: on the host,
//! or inside a running plugin daemon container. Falling back to the host
//! always goes through a [`Confirm`] channel unless `assume_yes` is set; a
//! "no" aborts the task.

use crate::capabilities::CapabilityReport;
use crate::docker::Locate;
use crate::error::{CliError, LocateError, ResolutionError};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Where the caller would like the task to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionPreference {
    /// Container when available, host otherwise (after confirmation)
    #[default]
    Auto,
    /// Host, without asking
    ForceLocal,
    /// Existing plugin daemon container
    ForceContainer,
    /// Accepted for compatibility; behaves exactly like `ForceContainer`
    ForceNewContainer,
}

impl ExecutionPreference {
    /// Name used on the command line and in `REPACKAGE_EXECUTION`
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionPreference::Auto => "auto",
            ExecutionPreference::ForceLocal => "local",
            ExecutionPreference::ForceContainer => "docker",
            ExecutionPreference::ForceNewContainer => "new-docker",
        }
    }
}

impl fmt::Display for ExecutionPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionPreference {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(ExecutionPreference::Auto),
            "local" => Ok(ExecutionPreference::ForceLocal),
            "docker" => Ok(ExecutionPreference::ForceContainer),
            "new-docker" | "new_docker" => Ok(ExecutionPreference::ForceNewContainer),
            other => Err(CliError::InvalidArguments {
                reason: format!(
                    "unknown execution preference '{}', expected auto, local, docker or new-docker",
                    other
                ),
            }),
        }
    }
}

/// Where a task runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Strategy {
    /// On the invoking host
    Local,
    /// Inside an existing container
    #[serde(rename_all = "camelCase")]
    Container {
        /// Container id
        container_id: String,
    },
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Local => f.write_str("local"),
            Strategy::Container { container_id } => write!(f, "container {}", container_id),
        }
    }
}

/// The single resolved decision for one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    /// Where to run
    pub strategy: Strategy,
    /// Whether the plan is a fallback that needed confirmation
    pub requires_confirmation: bool,
}

impl ExecutionPlan {
    fn local(requires_confirmation: bool) -> Self {
        Self {
            strategy: Strategy::Local,
            requires_confirmation,
        }
    }

    /// Container id when the plan runs in a container
    pub fn container_id(&self) -> Option<&str> {
        match &self.strategy {
            Strategy::Container { container_id } => Some(container_id),
            Strategy::Local => None,
        }
    }
}

/// Why the container strategy is unavailable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// No docker CLI on this host
    NoDaemon,
    /// Docker is installed but nothing from the daemon image family exists
    NoDaemonImage,
    /// A daemon image exists but no running container was found
    ContainerUnavailable(LocateError),
}

impl FallbackReason {
    /// Question put to the confirmation channel
    pub fn prompt(&self) -> &'static str {
        match self {
            FallbackReason::ContainerUnavailable(_) => {
                "Do you want to execute locally instead? (yes/no): "
            }
            FallbackReason::NoDaemon | FallbackReason::NoDaemonImage => {
                "Do you want to execute locally? (yes/no): "
            }
        }
    }

    /// What the user can do to make the container strategy available
    pub fn remediation(&self) -> String {
        match self {
            FallbackReason::ContainerUnavailable(e) => e
                .remediation()
                .unwrap_or_else(|| "Please fix the Docker container issue and try again".to_string()),
            FallbackReason::NoDaemon | FallbackReason::NoDaemonImage => {
                "Please install Docker and the dify-plugin-daemon image, or run this tool inside a Docker container"
                    .to_string()
            }
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NoDaemon => f.write_str("Docker is not installed"),
            FallbackReason::NoDaemonImage => {
                f.write_str("no dify-plugin-daemon image or container found")
            }
            FallbackReason::ContainerUnavailable(e) => {
                write!(f, "failed to find a running plugin daemon container: {}", e)
            }
        }
    }
}

/// Outcome of the decision step, before any confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Final plan, no question needed
    Plan(ExecutionPlan),
    /// Falling back to local needs an explicit yes
    NeedsConfirmation(FallbackReason),
}

/// A yes/no question answered by someone outside the resolver.
///
/// Resolution suspends on [`Confirm::ask`] until it returns.
#[allow(async_fn_in_trait)]
pub trait Confirm {
    /// Returns `true` for yes
    async fn ask(&self, prompt: &str) -> bool;
}

/// Answers yes to everything
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    async fn ask(&self, _prompt: &str) -> bool {
        true
    }
}

impl<T: Confirm> Confirm for &T {
    async fn ask(&self, prompt: &str) -> bool {
        (**self).ask(prompt).await
    }
}

/// A fixed answer
impl Confirm for bool {
    async fn ask(&self, _prompt: &str) -> bool {
        *self
    }
}

/// Accepts `yes`/`y` in any case; everything else is no
pub fn parse_answer(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "yes" | "y")
}

/// Resolver settings taken from [`crate::RepackageConfig`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Same signal as [`ExecutionPreference::ForceLocal`]
    pub force_local: bool,
    /// Take the local fallback without asking
    pub assume_yes: bool,
}

/// Chooses the execution strategy for one task
pub struct ExecutionResolver<C> {
    config: ResolverConfig,
    confirm: C,
}

impl<C: Confirm> ExecutionResolver<C> {
    /// Creates a resolver that asks `confirm` before falling back
    pub fn new(config: ResolverConfig, confirm: C) -> Self {
        Self { config, confirm }
    }

    /// Applies the decision rules without asking anything.
    pub async fn decide<L: Locate>(
        &self,
        preference: ExecutionPreference,
        inside_container: bool,
        report: &CapabilityReport,
        locator: &L,
    ) -> Decision {
        if inside_container {
            log::info!("Running inside a Docker container, executing locally");
            return Decision::Plan(ExecutionPlan::local(false));
        }

        if self.config.force_local || preference == ExecutionPreference::ForceLocal {
            log::info!("Local execution forced");
            return Decision::Plan(ExecutionPlan::local(false));
        }

        if !report.docker_available {
            return Decision::NeedsConfirmation(FallbackReason::NoDaemon);
        }
        if !report.daemon_image_present {
            return Decision::NeedsConfirmation(FallbackReason::NoDaemonImage);
        }

        match locator.locate().await {
            Ok(container) => Decision::Plan(ExecutionPlan {
                strategy: Strategy::Container {
                    container_id: container.id,
                },
                requires_confirmation: false,
            }),
            Err(e) => Decision::NeedsConfirmation(FallbackReason::ContainerUnavailable(e)),
        }
    }

    /// Decides, confirming a local fallback when one is needed.
    pub async fn resolve<L: Locate>(
        &self,
        preference: ExecutionPreference,
        inside_container: bool,
        report: &CapabilityReport,
        locator: &L,
    ) -> Result<ExecutionPlan, ResolutionError> {
        let reason = match self
            .decide(preference, inside_container, report, locator)
            .await
        {
            Decision::Plan(plan) => return Ok(plan),
            Decision::NeedsConfirmation(reason) => reason,
        };

        log::warn!("{}", reason);
        if self.config.assume_yes {
            log::info!("Falling back to local execution without confirmation");
            return Ok(ExecutionPlan::local(true));
        }

        if self.confirm.ask(reason.prompt()).await {
            Ok(ExecutionPlan::local(true))
        } else {
            Err(ResolutionError::Declined {
                remediation: reason.remediation(),
                reason: reason.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::probe::ProbeResults;
    use crate::docker::{ContainerSummary, RunningState};

    fn report(docker_available: bool, daemon_image_present: bool) -> CapabilityReport {
        CapabilityReport::from_probes(ProbeResults {
            docker_available,
            docker_running: docker_available,
            daemon_image_present,
            ..Default::default()
        })
    }

    fn running(id: &str) -> Result<ContainerSummary, LocateError> {
        Ok(ContainerSummary {
            id: id.to_string(),
            name: "docker-plugin_daemon-1".to_string(),
            image: "langgenius/dify-plugin-daemon:0.1.0-local".to_string(),
            state: RunningState::Running,
        })
    }

    #[test]
    fn test_preference_names() {
        for pref in [
            ExecutionPreference::Auto,
            ExecutionPreference::ForceLocal,
            ExecutionPreference::ForceContainer,
            ExecutionPreference::ForceNewContainer,
        ] {
            assert_eq!(pref.as_str().parse::<ExecutionPreference>().unwrap(), pref);
        }
        assert!("sideways".parse::<ExecutionPreference>().is_err());
    }

    #[test]
    fn test_parse_answer() {
        assert!(parse_answer("yes\n"));
        assert!(parse_answer(" Y "));
        assert!(!parse_answer("no"));
        assert!(!parse_answer(""));
        assert!(!parse_answer("yep"));
    }

    #[tokio::test]
    async fn test_inside_container_is_always_local() {
        let resolver = ExecutionResolver::new(ResolverConfig::default(), false);
        let plan = resolver
            .resolve(
                ExecutionPreference::ForceContainer,
                true,
                &report(true, true),
                &running("abc"),
            )
            .await
            .unwrap();
        assert_eq!(plan.strategy, Strategy::Local);
        assert!(!plan.requires_confirmation);
    }

    #[tokio::test]
    async fn test_force_local_from_config_or_preference() {
        let from_config = ExecutionResolver::new(
            ResolverConfig {
                force_local: true,
                assume_yes: false,
            },
            false,
        );
        let plan = from_config
            .resolve(ExecutionPreference::Auto, false, &report(true, true), &running("abc"))
            .await
            .unwrap();
        assert_eq!(plan, ExecutionPlan::local(false));

        let from_preference = ExecutionResolver::new(ResolverConfig::default(), false);
        let plan = from_preference
            .resolve(ExecutionPreference::ForceLocal, false, &report(true, true), &running("abc"))
            .await
            .unwrap();
        assert_eq!(plan, ExecutionPlan::local(false));
    }

    #[tokio::test]
    async fn test_running_container_is_chosen() {
        let resolver = ExecutionResolver::new(ResolverConfig::default(), false);
        let plan = resolver
            .resolve(ExecutionPreference::Auto, false, &report(true, true), &running("abc"))
            .await
            .unwrap();
        assert_eq!(plan.container_id(), Some("abc"));
        assert!(!plan.requires_confirmation);
    }

    #[tokio::test]
    async fn test_new_container_preference_is_an_alias() {
        let resolver = ExecutionResolver::new(ResolverConfig::default(), false);
        let a = resolver
            .decide(ExecutionPreference::ForceContainer, false, &report(true, true), &running("abc"))
            .await;
        let b = resolver
            .decide(ExecutionPreference::ForceNewContainer, false, &report(true, true), &running("abc"))
            .await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_stopped_container_declined_carries_start_command() {
        let resolver = ExecutionResolver::new(ResolverConfig::default(), false);
        let stopped: Result<ContainerSummary, LocateError> = Err(LocateError::StoppedOnly {
            id: "dead01".to_string(),
            name: "plugin_daemon".to_string(),
        });
        let err = resolver
            .resolve(ExecutionPreference::Auto, false, &report(true, true), &stopped)
            .await
            .unwrap_err();
        let ResolutionError::Declined { remediation, .. } = err;
        assert_eq!(remediation, "Please start it using: docker start dead01");
    }

    #[tokio::test]
    async fn test_assume_yes_bypasses_confirmation() {
        let resolver = ExecutionResolver::new(
            ResolverConfig {
                force_local: false,
                assume_yes: true,
            },
            false,
        );
        let plan = resolver
            .resolve(ExecutionPreference::Auto, false, &report(false, false), &running("abc"))
            .await
            .unwrap();
        assert_eq!(plan, ExecutionPlan::local(true));
    }

    #[tokio::test]
    async fn test_confirmed_fallback_is_local() {
        let resolver = ExecutionResolver::new(ResolverConfig::default(), AssumeYes);
        let plan = resolver
            .resolve(ExecutionPreference::Auto, false, &report(false, false), &running("abc"))
            .await
            .unwrap();
        assert_eq!(plan.strategy, Strategy::Local);
        assert!(plan.requires_confirmation);
    }

    #[tokio::test]
    async fn test_same_inputs_same_plan() {
        let resolver = ExecutionResolver::new(ResolverConfig::default(), AssumeYes);
        let inputs = report(true, true);
        let first = resolver
            .resolve(ExecutionPreference::Auto, false, &inputs, &running("abc"))
            .await
            .unwrap();
        for _ in 0..5 {
            let again = resolver
                .resolve(ExecutionPreference::Auto, false, &inputs, &running("abc"))
                .await
                .unwrap();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn test_strategy_json() {
        let json = serde_json::to_value(Strategy::Container {
            container_id: "abc".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "container", "containerId": "abc"}));
        assert_eq!(
            serde_json::to_value(Strategy::Local).unwrap(),
            serde_json::json!({"type": "local"})
        );
    }
}
