//! Repackaging task kinds and their derived identities.
//!
//! A task is one invocation of `plugin_repackaging.sh` with positional
//! arguments `(command, args...)`. The task identity also determines the
//! pattern used to find its single output artifact.

use crate::error::TaskError;
use crate::sanitize::sanitize_file_name;
use glob::Pattern;
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Extension every plugin package carries
pub const PACKAGE_EXTENSION: &str = ".difypkg";

/// Marker inserted before the extension of every repackaged artifact
pub const RESULT_SUFFIX: &str = "-offline";

/// The three kinds of repackaging task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    /// Repackage a `.difypkg` already on disk
    Local,
    /// Download from the Dify marketplace, then repackage
    Market,
    /// Download a GitHub release asset, then repackage
    Github,
}

impl TaskMode {
    /// Every mode the tool knows about
    pub const ALL: [TaskMode; 3] = [TaskMode::Local, TaskMode::Market, TaskMode::Github];

    /// Command name passed as the first positional argument
    pub fn as_str(self) -> &'static str {
        match self {
            TaskMode::Local => "local",
            TaskMode::Market => "market",
            TaskMode::Github => "github",
        }
    }

    /// Whether the mode downloads its input
    pub fn requires_network(self) -> bool {
        matches!(self, TaskMode::Market | TaskMode::Github)
    }
}

impl fmt::Display for TaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One repackaging task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepackageTask {
    /// Local package file (absolute path)
    Local {
        /// Path to the `.difypkg` on the host
        path: PathBuf,
    },
    /// Marketplace plugin
    Market {
        /// Plugin author
        author: String,
        /// Plugin name
        name: String,
        /// Plugin version
        version: String,
    },
    /// GitHub release asset
    Github {
        /// `owner/repo` or repository URL
        repository: String,
        /// Release title/tag
        release: String,
        /// Asset file name
        asset: String,
    },
}

fn require(value: &str, mode: TaskMode, field: &'static str) -> Result<String, TaskError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TaskError::MissingField {
            mode: mode.as_str(),
            field,
        });
    }
    Ok(value.to_string())
}

impl RepackageTask {
    /// Validates a local package path and makes it absolute.
    pub fn local(path: impl AsRef<Path>) -> Result<Self, TaskError> {
        let path = path.as_ref();

        if !path.to_string_lossy().ends_with(PACKAGE_EXTENSION) {
            return Err(TaskError::UnsupportedExtension {
                path: path.to_path_buf(),
                extension: PACKAGE_EXTENSION,
            });
        }

        if !path.exists() {
            return Err(TaskError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let absolute = path
            .absolutize()
            .map_err(|e| TaskError::InvalidPath {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .into_owned();

        Ok(RepackageTask::Local { path: absolute })
    }

    /// Builds a marketplace task; every field must be non-empty.
    pub fn market(author: &str, name: &str, version: &str) -> Result<Self, TaskError> {
        Ok(RepackageTask::Market {
            author: require(author, TaskMode::Market, "author")?,
            name: require(name, TaskMode::Market, "name")?,
            version: require(version, TaskMode::Market, "version")?,
        })
    }

    /// Builds a GitHub release task; every field must be non-empty.
    pub fn github(repository: &str, release: &str, asset: &str) -> Result<Self, TaskError> {
        Ok(RepackageTask::Github {
            repository: require(repository, TaskMode::Github, "repository")?,
            release: require(release, TaskMode::Github, "release")?,
            asset: require(asset, TaskMode::Github, "asset")?,
        })
    }

    /// Mode of this task
    pub fn mode(&self) -> TaskMode {
        match self {
            RepackageTask::Local { .. } => TaskMode::Local,
            RepackageTask::Market { .. } => TaskMode::Market,
            RepackageTask::Github { .. } => TaskMode::Github,
        }
    }

    /// Positional arguments for the entry point: `(command, args...)`
    pub fn command_args(&self) -> Vec<String> {
        let mut args = vec![self.mode().as_str().to_string()];
        match self {
            RepackageTask::Local { path } => args.push(path.to_string_lossy().into_owned()),
            RepackageTask::Market {
                author,
                name,
                version,
            } => args.extend([author.clone(), name.clone(), version.clone()]),
            RepackageTask::Github {
                repository,
                release,
                asset,
            } => args.extend([repository.clone(), release.clone(), asset.clone()]),
        }
        args
    }

    /// Sanitized file name the local input is staged under, if any
    pub fn staged_input_name(&self) -> Option<String> {
        match self {
            RepackageTask::Local { path } => {
                let original = path.file_name()?.to_string_lossy();
                Some(sanitize_file_name(&original, PACKAGE_EXTENSION))
            }
            _ => None,
        }
    }

    /// Pattern identifying this task's output artifact inside the container,
    /// where a local input runs under its sanitized name
    pub fn output_pattern(&self) -> OutputPattern {
        self.pattern_for_input(self.staged_input_name())
    }

    /// Pattern identifying this task's output artifact after a host run,
    /// where the script sees the input under its original name
    pub fn host_output_pattern(&self) -> OutputPattern {
        let original = match self {
            RepackageTask::Local { path } => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            _ => None,
        };
        self.pattern_for_input(original)
    }

    fn pattern_for_input(&self, input_name: Option<String>) -> OutputPattern {
        let result_tail = format!("{}{}", RESULT_SUFFIX, PACKAGE_EXTENSION);
        match self {
            RepackageTask::Local { .. } => stem_pattern(&input_name.unwrap_or_default()),
            RepackageTask::Market { name, version, .. } => {
                let name_esc = Pattern::escape(name);
                let version_esc = Pattern::escape(version);
                // The version must end at a non-alphanumeric boundary, so that
                // `v1` never matches the output of `v12`.
                OutputPattern::new(
                    format!("*{}*{}*{}", name, version, result_tail),
                    vec![
                        format!("*{}*{}{}", name_esc, version_esc, result_tail),
                        format!("*{}*{}[!0-9A-Za-z]*{}", name_esc, version_esc, result_tail),
                    ],
                )
            }
            RepackageTask::Github { asset, .. } => stem_pattern(asset),
        }
    }
}

/// `<stem>*-offline.difypkg`, with `file_name`'s extension stripped and its
/// glob metacharacters matched literally
fn stem_pattern(file_name: &str) -> OutputPattern {
    let base = file_name.strip_suffix(PACKAGE_EXTENSION).unwrap_or(file_name);
    let result_tail = format!("{}{}", RESULT_SUFFIX, PACKAGE_EXTENSION);
    OutputPattern::new(
        format!("{}*{}", base, result_tail),
        vec![format!("{}*{}", Pattern::escape(base), result_tail)],
    )
}

/// Glob-style pattern for a task's output artifact.
///
/// Holds one or more compiled alternatives; a file name matches when any
/// alternative matches it.
#[derive(Debug, Clone)]
pub struct OutputPattern {
    display: String,
    alternatives: Vec<Pattern>,
}

impl OutputPattern {
    fn new(display: String, sources: Vec<String>) -> Self {
        let alternatives = sources
            .iter()
            .filter_map(|source| match Pattern::new(source) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    log::warn!("Ignoring invalid output pattern {:?}: {}", source, e);
                    None
                }
            })
            .collect();
        Self {
            display,
            alternatives,
        }
    }

    /// Human-readable form of the pattern
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Whether `file_name` (a bare name, not a path) is this task's output
    pub fn matches(&self, file_name: &str) -> bool {
        self.alternatives.iter().any(|p| p.matches(file_name))
    }
}

impl fmt::Display for OutputPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}
