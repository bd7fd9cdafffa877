//! Plugin daemon container discovery.
//!
//! Containers are matched by a case-insensitive substring test of their name
//! or image against [`DAEMON_KEYWORDS`]. This is a naming convention, not an
//! identity check; unrelated containers with similar names can match. The
//! running pass always wins over the stopped pass.

use super::client::{ContainerSummary, DaemonClient, PsFilter, RunningState};
use crate::error::LocateError;

/// Substrings that identify the plugin daemon family
pub const DAEMON_KEYWORDS: &[&str] = &["plugin_daemon", "plugin-daemon"];

/// Whether `value` contains any daemon keyword, ignoring case
pub fn matches_daemon_family(value: &str) -> bool {
    let lower = value.to_lowercase();
    DAEMON_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn is_candidate(container: &ContainerSummary) -> bool {
    matches_daemon_family(&container.name) || matches_daemon_family(&container.image)
}

/// Something that can produce the container to run in
#[allow(async_fn_in_trait)]
pub trait Locate {
    /// Finds a running daemon container, or says why there is none
    async fn locate(&self) -> Result<ContainerSummary, LocateError>;
}

/// A fixed outcome, for callers that already know the answer
impl Locate for Result<ContainerSummary, LocateError> {
    async fn locate(&self) -> Result<ContainerSummary, LocateError> {
        self.clone()
    }
}

/// Two-pass search over a daemon's containers and images
pub struct ContainerLocator<'a, D> {
    client: &'a D,
}

impl<'a, D: DaemonClient> ContainerLocator<'a, D> {
    /// Searches through `client`
    pub fn new(client: &'a D) -> Self {
        Self { client }
    }
}

impl<D: DaemonClient> Locate for ContainerLocator<'_, D> {
    async fn locate(&self) -> Result<ContainerSummary, LocateError> {
        let running = self.client.ps(PsFilter::Running).await?;
        if let Some(found) = running.into_iter().find(is_candidate) {
            log::info!(
                "Found running plugin daemon container: {} (name: {})",
                found.id,
                found.name
            );
            return Ok(found);
        }

        let all = self.client.ps(PsFilter::All).await?;
        if let Some(found) = all.into_iter().find(is_candidate) {
            // Started between the two listings.
            if found.state == RunningState::Running {
                return Ok(found);
            }
            log::warn!(
                "Plugin daemon container {} ({}) exists but is not running",
                found.id,
                found.name
            );
            return Err(LocateError::StoppedOnly {
                id: found.id,
                name: found.name,
            });
        }

        match self.client.images().await {
            Ok(images) => {
                if let Some(image) = images
                    .iter()
                    .find(|i| matches_daemon_family(&i.reference()))
                {
                    return Err(LocateError::ImageOnly {
                        image: image.reference(),
                    });
                }
            }
            Err(e) => log::debug!("Image listing failed: {}", e),
        }

        Err(LocateError::NothingFound)
    }
}
