//! Container daemon integration for repackaging inside the plugin daemon.
//!
//! When the plugin daemon container is running, tasks run inside it so the
//! Python toolchain matches the one plugins are installed with.
//!
//! # Flow
//!
//! 1. [`ContainerLocator`] finds a running plugin daemon container
//! 2. [`ArtifactStager::stage`] copies the entry point, the helper binary for
//!    the container's platform and any local input into `/tmp/repackage`
//! 3. [`ArtifactStager::run`] executes the task and streams its output
//! 4. [`ArtifactStager::retrieve`] copies the one output artifact back
//!
//! # Module Structure
//!
//! - `client` - Daemon client contract and Docker CLI implementation
//! - `locator` - Two-pass container discovery
//! - `platform` - Container OS/architecture query and helper naming
//! - `stager` - Staging, execution and retrieval

mod client;
mod locator;
mod platform;
mod stager;

pub use client::{
    ContainerSummary, DAEMON_COMMAND_TIMEOUT, DaemonClient, DockerCli, ImageSummary, PsFilter,
    RunningState,
};
pub use locator::{ContainerLocator, DAEMON_KEYWORDS, Locate, matches_daemon_family};
pub use platform::{HELPER_PREFIX, HELPER_SUFFIX, Platform};
pub use stager::{ArtifactStager, CONTAINER_WORK_DIR, OutputArtifact, StagedArtifact, StagedTask};
