//! Error types for dify_repackage operations.
//!
//! Every fatal failure names the resource that was missing (binary, container,
//! pattern) and carries actionable recovery suggestions. Host probes never
//! produce errors; they degrade to `false`.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dify_repackage operations
pub type Result<T> = std::result::Result<T, RepackageError>;

/// Main error type for all dify_repackage operations
#[derive(Error, Debug)]
pub enum RepackageError {
    /// Task parameter errors
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    /// No viable execution strategy
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Copy/chmod/exec step inside the container failed
    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),

    /// Container platform has no matching helper binary
    #[error("Architecture mismatch: {0}")]
    Architecture(#[from] ArchitectureMismatch),

    /// Output artifact could not be retrieved
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Local subprocess errors
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Machine-checkable failure category reported alongside the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// Invalid task parameters
    Task,
    /// No strategy available or confirmation declined
    Resolution,
    /// Container staging failed
    Staging,
    /// No helper binary for the container platform
    ArchitectureMismatch,
    /// No output produced or copy-back failed
    Retrieval,
    /// Task process failed
    Execution,
    /// Invalid command line
    Cli,
    /// Host I/O failure
    Io,
}

/// Task parameter errors
#[derive(Error, Debug)]
pub enum TaskError {
    /// Input file does not carry the package extension
    #[error("File must have {extension} extension: {path}")]
    UnsupportedExtension {
        /// Offending path
        path: PathBuf,
        /// Required extension
        extension: &'static str,
    },

    /// Input file missing on the host
    #[error("File {path} does not exist")]
    FileNotFound {
        /// Missing path
        path: PathBuf,
    },

    /// Path could not be made absolute
    #[error("Failed to get absolute path for {path}: {reason}")]
    InvalidPath {
        /// Offending path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// A required task field is empty
    #[error("{mode} task requires a non-empty {field}")]
    MissingField {
        /// Task mode name
        mode: &'static str,
        /// Field name
        field: &'static str,
    },
}

/// Why the container strategy could not be used
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    /// A matching container exists but is not running
    #[error("found stopped plugin daemon container: {id} (name: {name})")]
    StoppedOnly {
        /// Container id
        id: String,
        /// Container name
        name: String,
    },

    /// A matching image exists but no container was ever created from it
    #[error("found plugin daemon image: {image}, but no container exists")]
    ImageOnly {
        /// `repository:tag` of the image
        image: String,
    },

    /// Nothing matches the daemon-image family
    #[error("no plugin daemon container or image found")]
    NothingFound,

    /// Daemon could not be queried
    #[error("{0}")]
    Daemon(#[from] DaemonError),
}

impl LocateError {
    /// Instruction that resolves this outcome, if one exists
    pub fn remediation(&self) -> Option<String> {
        match self {
            LocateError::StoppedOnly { id, .. } => {
                Some(format!("Please start it using: docker start {}", id))
            }
            LocateError::ImageOnly { image } => Some(format!(
                "Please start a container using: docker run -d --name plugin-daemon-repackage {}",
                image
            )),
            LocateError::NothingFound | LocateError::Daemon(_) => None,
        }
    }
}

/// Resolution errors
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// Local fallback was offered and declined
    #[error("Operation cancelled: {reason}. {remediation}")]
    Declined {
        /// What made the container strategy unavailable
        reason: String,
        /// What the user can do about it
        remediation: String,
    },
}

/// Container daemon client errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DaemonError {
    /// No daemon binary on this host
    #[error("Docker CLI not found")]
    NotInstalled,

    /// Daemon command could not be spawned or waited on
    #[error("{command} failed: {reason}")]
    CommandFailed {
        /// Command line
        command: String,
        /// Reason for the error
        reason: String,
    },

    /// Daemon command exited non-zero
    #[error("{command} exited with code {code}: {stderr}")]
    NonZeroExit {
        /// Command line
        command: String,
        /// Exit code (-1 when killed by a signal)
        code: i32,
        /// Captured stderr
        stderr: String,
    },

    /// Daemon command exceeded its timeout
    #[error("{command} timed out after {secs} seconds")]
    TimedOut {
        /// Command line
        command: String,
        /// Timeout in seconds
        secs: u64,
    },
}

/// Staging errors (container strategy only)
#[derive(Error, Debug)]
pub enum StagingError {
    /// Working directory could not be created
    #[error("Failed to create directory {path} in container {container}: {source}")]
    CreateWorkDir {
        /// Container id
        container: String,
        /// Directory inside the container
        path: String,
        /// Underlying daemon error
        #[source]
        source: DaemonError,
    },

    /// `docker cp` into the container failed
    #[error("Failed to copy {file} to container {container}: {source}")]
    CopyFailed {
        /// Host file
        file: PathBuf,
        /// Container id
        container: String,
        /// Underlying daemon error
        #[source]
        source: DaemonError,
    },

    /// `chmod +x` inside the container failed
    #[error("Failed to set execute permission on {path} in container {container}: {source}")]
    ChmodFailed {
        /// Container id
        container: String,
        /// Path inside the container
        path: String,
        /// Underlying daemon error
        #[source]
        source: DaemonError,
    },

    /// OS/architecture query inside the container failed
    #[error("Failed to detect OS/architecture of container {container}: {source}")]
    PlatformQuery {
        /// Container id
        container: String,
        /// Underlying daemon error
        #[source]
        source: DaemonError,
    },

    /// Entry point inside the container exited non-zero
    #[error("Failed to execute {command} in container {container}: {source}")]
    ExecFailed {
        /// Container id
        container: String,
        /// Command line inside the container
        command: String,
        /// Underlying daemon error
        #[source]
        source: DaemonError,
    },
}

/// The container platform has no usable helper binary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchitectureMismatch {
    /// No helper binary is built for this OS/architecture pair
    #[error("Unsupported container platform: os={os}, arch={arch}")]
    UnsupportedPlatform {
        /// Reported OS
        os: String,
        /// Reported architecture
        arch: String,
    },

    /// The helper binary for this platform is not on the host
    #[error("Could not find {binary} for container in any of: {}", display_paths(.searched))]
    MissingHelper {
        /// Helper binary file name
        binary: String,
        /// Locations that were checked
        searched: Vec<PathBuf>,
    },
}

/// Retrieval errors
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The task ran but produced nothing matching the pattern
    #[error("No packaged file matching {pattern} found in {location}")]
    NoOutput {
        /// Match pattern
        pattern: String,
        /// Where the search ran
        location: String,
    },

    /// Listing the container working directory failed
    #[error("Failed to find packaged file in container {container}: {source}")]
    SearchFailed {
        /// Container id
        container: String,
        /// Underlying daemon error
        #[source]
        source: DaemonError,
    },

    /// Copying the artifact back to the host failed
    #[error("Failed to copy {file} from container {container}: {source}")]
    CopyBackFailed {
        /// Container id
        container: String,
        /// Path inside the container
        file: String,
        /// Underlying daemon error
        #[source]
        source: DaemonError,
    },
}

/// Local subprocess errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// `plugin_repackaging.sh` not found
    #[error("Could not find {script} script in any of: {}", display_paths(.searched))]
    EntryPointNotFound {
        /// Script file name
        script: &'static str,
        /// Locations that were checked
        searched: Vec<PathBuf>,
    },

    /// Process could not be started
    #[error("Failed to start {command}: {reason}")]
    SpawnFailed {
        /// Command line
        command: String,
        /// Reason for the error
        reason: String,
    },

    /// Process exited non-zero
    #[error("{command} exited with code {code}")]
    NonZeroExit {
        /// Command line
        command: String,
        /// Exit code (-1 when killed by a signal)
        code: i32,
    },

    /// Process exceeded the task timeout and was killed
    #[error("{command} timed out after {secs} seconds and was killed")]
    TimedOut {
        /// Command line
        command: String,
        /// Timeout in seconds
        secs: u64,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl RepackageError {
    /// Machine-checkable category of this failure
    pub fn kind(&self) -> FailureKind {
        match self {
            RepackageError::Task(_) => FailureKind::Task,
            RepackageError::Resolution(_) => FailureKind::Resolution,
            RepackageError::Staging(_) => FailureKind::Staging,
            RepackageError::Architecture(_) => FailureKind::ArchitectureMismatch,
            RepackageError::Retrieval(_) => FailureKind::Retrieval,
            RepackageError::Execution(_) => FailureKind::Execution,
            RepackageError::Cli(_) => FailureKind::Cli,
            RepackageError::Io(_) | RepackageError::Json(_) => FailureKind::Io,
        }
    }

    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            RepackageError::Resolution(ResolutionError::Declined { .. }) => vec![
                "Start the plugin daemon container and try again".to_string(),
                "Install Docker, or run this tool inside the plugin daemon container".to_string(),
                "Pass --yes (or set REPACKAGE_ASSUME_YES=true) to fall back to local execution"
                    .to_string(),
            ],
            RepackageError::Architecture(ArchitectureMismatch::MissingHelper {
                binary, ..
            }) => vec![
                format!("Place {} next to plugin_repackaging.sh or in a bin/ directory", binary),
                "Use --script-dir to point at the directory holding the helper binaries"
                    .to_string(),
            ],
            RepackageError::Architecture(ArchitectureMismatch::UnsupportedPlatform { .. }) => {
                vec!["Run with --force-local to repackage on the host instead".to_string()]
            }
            RepackageError::Staging(_) => vec![
                "Check that the container is still running: docker ps".to_string(),
                "Stale files in the container working directory are harmless; retry the task"
                    .to_string(),
            ],
            RepackageError::Retrieval(RetrievalError::NoOutput { .. }) => vec![
                "Review the task output above for errors from plugin_repackaging.sh".to_string(),
            ],
            RepackageError::Execution(ExecutionError::EntryPointNotFound { .. }) => vec![
                "Use --script-dir to point at the directory holding plugin_repackaging.sh"
                    .to_string(),
            ],
            RepackageError::Execution(ExecutionError::TimedOut { .. }) => {
                vec!["Increase --timeout or omit it to wait indefinitely".to_string()]
            }
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}
