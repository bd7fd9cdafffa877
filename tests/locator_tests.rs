mod common;

#[cfg(test)]
mod tests {
    use super::common::FakeDaemon;
    use dify_repackage::docker::{ContainerLocator, Locate, RunningState};
    use dify_repackage::error::LocateError;

    #[tokio::test]
    async fn test_running_match_beats_earlier_stopped_match() {
        let daemon = FakeDaemon::default()
            .with_container(
                "stopped1",
                "old-plugin_daemon",
                "langgenius/dify-plugin-daemon:0.0.9",
                RunningState::Stopped,
            )
            .with_container(
                "running1",
                "docker-plugin_daemon-1",
                "langgenius/dify-plugin-daemon:0.1.0",
                RunningState::Running,
            );

        let found = ContainerLocator::new(&daemon).locate().await.unwrap();
        assert_eq!(found.id, "running1");
    }

    #[tokio::test]
    async fn test_first_running_match_in_daemon_order() {
        let daemon = FakeDaemon::default()
            .with_container("a", "api", "langgenius/dify-api", RunningState::Running)
            .with_container("b", "PLUGIN-DAEMON", "custom:1", RunningState::Running)
            .with_container("c", "other", "langgenius/dify-plugin-daemon:1", RunningState::Running);

        let found = ContainerLocator::new(&daemon).locate().await.unwrap();
        assert_eq!(found.id, "b");
    }

    #[tokio::test]
    async fn test_stopped_only_is_reported_with_id() {
        let daemon = FakeDaemon::default().with_container(
            "dead01",
            "docker-plugin_daemon-1",
            "langgenius/dify-plugin-daemon:0.1.0",
            RunningState::Stopped,
        );

        let err = ContainerLocator::new(&daemon).locate().await.unwrap_err();
        assert_eq!(
            err,
            LocateError::StoppedOnly {
                id: "dead01".to_string(),
                name: "docker-plugin_daemon-1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_image_without_container() {
        let daemon = FakeDaemon::default()
            .with_container("a", "api", "langgenius/dify-api", RunningState::Running)
            .with_image("langgenius/dify-plugin-daemon", "0.1.0-local");

        let err = ContainerLocator::new(&daemon).locate().await.unwrap_err();
        assert_eq!(
            err,
            LocateError::ImageOnly {
                image: "langgenius/dify-plugin-daemon:0.1.0-local".to_string(),
            }
        );
        assert!(err.remediation().unwrap().contains("docker run -d"));
    }

    #[tokio::test]
    async fn test_nothing_found() {
        let daemon = FakeDaemon::default()
            .with_container("a", "api", "langgenius/dify-api", RunningState::Running)
            .with_image("nginx", "latest");

        let err = ContainerLocator::new(&daemon).locate().await.unwrap_err();
        assert_eq!(err, LocateError::NothingFound);
        assert_eq!(daemon.calls(), vec!["ps Running", "ps All", "images"]);
    }
}
