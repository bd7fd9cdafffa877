//! # Dify Repackage
//!
//! Repackages Dify plugins (`.difypkg`) with their Python dependencies bundled
//! for offline installation.
//!
//! The transformation itself is done by `plugin_repackaging.sh`. This crate
//! decides where that script runs and moves files across the container
//! boundary when needed.
//!
//! ## Features
//!
//! - **Capability Detection**: Probes Docker, Python, pip, unzip and network
//!   reachability, then recommends usable task modes
//! - **Execution Resolution**: Prefers a running plugin daemon container,
//!   falls back to the host only after explicit confirmation
//! - **Container Staging**: Copies the script, the helper binary for the
//!   container's own architecture and the input file under a sanitized name
//! - **Artifact Retrieval**: Finds the one `-offline.difypkg` the task produced
//!   and copies it back
//!
//! ## Usage
//!
//! ```bash
//! dify_repackage local ./my-plugin.difypkg
//! dify_repackage market langgenius openai 0.0.7
//! dify_repackage github junjiem/dify-plugin-tools-dbquery v0.0.2 db_query.difypkg
//! dify_repackage capabilities --json
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Core modules
pub mod capabilities;
pub mod cli;
pub mod docker;
pub mod error;
pub mod process;
pub mod resolver;
pub mod runner;
pub mod sanitize;
pub mod task;
pub mod tools;

// Re-export main types for public API
pub use capabilities::{CapabilityReport, detect_capabilities};
pub use cli::Args;
pub use docker::{ArtifactStager, ContainerLocator, DaemonClient, DockerCli};
pub use error::{FailureKind, RepackageError, Result};
pub use resolver::{
    Confirm, ExecutionPlan, ExecutionPreference, ExecutionResolver, ResolverConfig, Strategy,
};
pub use runner::{OutputMode, TaskOutcome, TaskRunner};
pub use sanitize::sanitize_file_name;
pub use task::{RepackageTask, TaskMode};
pub use tools::HostTools;

use capabilities::probe::DEFAULT_NETWORK_HOST;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for repackaging operations
#[derive(Debug, Clone)]
pub struct RepackageConfig {
    /// Where the caller would like tasks to run
    pub preference: ExecutionPreference,
    /// Always run on the host (`FORCE_LOCAL_EXECUTION`)
    pub force_local: bool,
    /// Take the local fallback without asking
    pub assume_yes: bool,
    /// Directory searched first for `plugin_repackaging.sh`
    pub script_dir: Option<PathBuf>,
    /// Where output artifacts land on the host
    pub output_dir: PathBuf,
    /// Working directory inside the container
    pub container_work_dir: String,
    /// Kill the task after this long; `None` waits indefinitely
    pub task_timeout: Option<Duration>,
    /// Host used by the network reachability probe
    pub network_host: String,
    /// How a local run's stdio is wired
    pub output_mode: OutputMode,
}

impl Default for RepackageConfig {
    fn default() -> Self {
        Self {
            preference: ExecutionPreference::Auto,
            force_local: false,
            assume_yes: false,
            script_dir: None,
            output_dir: PathBuf::from("."),
            container_work_dir: docker::CONTAINER_WORK_DIR.to_string(),
            task_timeout: None,
            network_host: DEFAULT_NETWORK_HOST.to_string(),
            output_mode: OutputMode::Inherit,
        }
    }
}

impl RepackageConfig {
    /// The part of the configuration the resolver sees
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            force_local: self.force_local,
            assume_yes: self.assume_yes,
        }
    }
}
