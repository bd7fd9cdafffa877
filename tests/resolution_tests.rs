mod common;

#[cfg(test)]
mod tests {
    use super::common::{FakeDaemon, ScriptedConfirm};
    use dify_repackage::capabilities::CapabilityReport;
    use dify_repackage::capabilities::probe::{ProbeResults, RuntimeInfo};
    use dify_repackage::docker::{ContainerLocator, RunningState};
    use dify_repackage::error::ResolutionError;
    use dify_repackage::resolver::{
        Decision, ExecutionPreference, ExecutionResolver, FallbackReason, ResolverConfig, Strategy,
    };
    use dify_repackage::TaskMode;

    const DAEMON_IMAGE: &str = "langgenius/dify-plugin-daemon:0.1.0-local";

    fn daemon_report(daemon_image_present: bool) -> CapabilityReport {
        CapabilityReport::from_probes(ProbeResults {
            docker_available: true,
            docker_running: true,
            daemon_image_present,
            ..Default::default()
        })
    }

    #[test]
    fn test_local_toolchain_with_network_recommends_everything() {
        let report = CapabilityReport::from_probes(ProbeResults {
            docker_available: false,
            docker_running: false,
            runtime: Some(RuntimeInfo {
                command: "python3.12".to_string(),
                version: "Python 3.12.4".to_string(),
                ideal: true,
            }),
            package_manager_available: true,
            archive_tool_available: true,
            network_available: true,
            ..Default::default()
        });

        for mode in TaskMode::ALL {
            assert!(report.is_recommended(mode), "{} should be recommended", mode);
        }
        assert!(report.disabled.is_empty());
    }

    #[tokio::test]
    async fn test_declined_fallback_is_a_hard_stop() {
        let daemon = FakeDaemon::linux_amd64();
        let confirm = ScriptedConfirm::answering(false);
        let resolver = ExecutionResolver::new(ResolverConfig::default(), &confirm);

        let err = resolver
            .resolve(
                ExecutionPreference::Auto,
                false,
                &daemon_report(false),
                &ContainerLocator::new(&daemon),
            )
            .await
            .unwrap_err();

        assert_eq!(confirm.times_asked(), 1);
        let ResolutionError::Declined { reason, .. } = err;
        assert!(reason.contains("dify-plugin-daemon"));
        // Nothing ran: no listing, no exec, no copy.
        assert!(daemon.calls().is_empty());
    }

    #[tokio::test]
    async fn test_running_daemon_container_is_used() {
        let daemon = FakeDaemon::linux_amd64()
            .with_container("aaa111", "web", "nginx:latest", RunningState::Running)
            .with_container("bbb222", "docker-plugin_daemon-1", DAEMON_IMAGE, RunningState::Running);
        let confirm = ScriptedConfirm::answering(false);
        let resolver = ExecutionResolver::new(ResolverConfig::default(), &confirm);

        let plan = resolver
            .resolve(
                ExecutionPreference::Auto,
                false,
                &daemon_report(true),
                &ContainerLocator::new(&daemon),
            )
            .await
            .unwrap();

        assert_eq!(
            plan.strategy,
            Strategy::Container {
                container_id: "bbb222".to_string()
            }
        );
        assert_eq!(confirm.times_asked(), 0);
    }

    #[tokio::test]
    async fn test_stopped_container_asks_before_falling_back() {
        let daemon = FakeDaemon::linux_amd64().with_container(
            "ccc333",
            "docker-plugin_daemon-1",
            DAEMON_IMAGE,
            RunningState::Stopped,
        );
        let confirm = ScriptedConfirm::answering(true);
        let resolver = ExecutionResolver::new(ResolverConfig::default(), &confirm);

        let plan = resolver
            .resolve(
                ExecutionPreference::Auto,
                false,
                &daemon_report(true),
                &ContainerLocator::new(&daemon),
            )
            .await
            .unwrap();

        assert_eq!(plan.strategy, Strategy::Local);
        assert!(plan.requires_confirmation);
        assert_eq!(
            confirm.prompts.lock().unwrap().as_slice(),
            ["Do you want to execute locally instead? (yes/no): "]
        );
    }

    #[tokio::test]
    async fn test_decision_without_docker_needs_confirmation() {
        let daemon = FakeDaemon::default();
        let resolver = ExecutionResolver::new(ResolverConfig::default(), false);
        let report = CapabilityReport::from_probes(ProbeResults::default());

        let decision = resolver
            .decide(
                ExecutionPreference::Auto,
                false,
                &report,
                &ContainerLocator::new(&daemon),
            )
            .await;
        assert_eq!(decision, Decision::NeedsConfirmation(FallbackReason::NoDaemon));
    }

    #[tokio::test]
    async fn test_force_local_never_touches_the_daemon() {
        let daemon = FakeDaemon::linux_amd64().with_container(
            "bbb222",
            "docker-plugin_daemon-1",
            DAEMON_IMAGE,
            RunningState::Running,
        );
        let confirm = ScriptedConfirm::answering(false);
        let resolver = ExecutionResolver::new(
            ResolverConfig {
                force_local: true,
                assume_yes: false,
            },
            &confirm,
        );

        let plan = resolver
            .resolve(
                ExecutionPreference::ForceContainer,
                false,
                &daemon_report(true),
                &ContainerLocator::new(&daemon),
            )
            .await
            .unwrap();
        assert_eq!(plan.strategy, Strategy::Local);
        assert!(daemon.calls().is_empty());
        assert_eq!(confirm.times_asked(), 0);
    }
}
