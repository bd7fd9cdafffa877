//! Command line argument parsing and validation.
//!
//! Ambient toggles (`FORCE_LOCAL_EXECUTION`, `REPACKAGE_ASSUME_YES`,
//! `REPACKAGE_EXECUTION`) are bound through clap's `env` support, so a flag
//! and its environment variable are the same setting.

use crate::RepackageConfig;
use crate::resolver::ExecutionPreference;
use crate::runner::OutputMode;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Repackage Dify plugins with offline dependencies
#[derive(Parser, Debug)]
#[command(
    name = "dify_repackage",
    version,
    about = "Repackage Dify plugins with offline dependencies",
    long_about = "Repackage Dify plugins (.difypkg) so they install without network access.

Runs inside the plugin daemon container when one is running, otherwise on
this host after confirmation.

Usage:
  dify_repackage local ./my-plugin.difypkg
  dify_repackage market langgenius openai 0.0.7
  dify_repackage github junjiem/dify-plugin-tools-dbquery v0.0.2 db_query.difypkg
  dify_repackage capabilities --json"
)]
pub struct Args {
    /// Command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Where to run the task
    #[arg(
        long,
        global = true,
        value_enum,
        env = "REPACKAGE_EXECUTION",
        default_value = "auto"
    )]
    pub execution: ExecutionArg,

    /// Always run on this host
    #[arg(long, global = true, env = "FORCE_LOCAL_EXECUTION")]
    pub force_local: bool,

    /// Fall back to local execution without asking
    #[arg(short = 'y', long = "yes", global = true, env = "REPACKAGE_ASSUME_YES")]
    pub assume_yes: bool,

    /// Directory containing plugin_repackaging.sh and the helper binaries
    #[arg(long, global = true, env = "REPACKAGE_SCRIPT_DIR", value_name = "DIR")]
    pub script_dir: Option<PathBuf>,

    /// Directory the repackaged file is written to
    #[arg(
        short,
        long,
        global = true,
        env = "REPACKAGE_OUTPUT_DIR",
        default_value = ".",
        value_name = "DIR"
    )]
    pub output_dir: PathBuf,

    /// Kill the task after this many seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Capture task output and print a JSON summary
    #[arg(long, global = true)]
    pub capture: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print extra detail
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Repackage a local .difypkg file
    Local {
        /// Path to the .difypkg file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Download and repackage a plugin from the Dify marketplace
    Market {
        /// Plugin author
        author: String,
        /// Plugin name
        name: String,
        /// Plugin version
        version: String,
    },

    /// Download and repackage a plugin from a GitHub release
    Github {
        /// Repository (`owner/repo` or URL)
        repository: String,
        /// Release title or tag
        release: String,
        /// Asset file name
        asset: String,
    },

    /// Show what this host can do and which modes are recommended
    Capabilities {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Command {
    /// Name used in messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Local { .. } => "local",
            Command::Market { .. } => "market",
            Command::Github { .. } => "github",
            Command::Capabilities { .. } => "capabilities",
        }
    }
}

/// `--execution` values
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionArg {
    /// Container when available, host after confirmation
    Auto,
    /// Host only
    Local,
    /// Existing plugin daemon container
    Docker,
    /// Same as docker
    NewDocker,
}

impl From<ExecutionArg> for ExecutionPreference {
    fn from(arg: ExecutionArg) -> Self {
        match arg {
            ExecutionArg::Auto => ExecutionPreference::Auto,
            ExecutionArg::Local => ExecutionPreference::ForceLocal,
            ExecutionArg::Docker => ExecutionPreference::ForceContainer,
            ExecutionArg::NewDocker => ExecutionPreference::ForceNewContainer,
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout == Some(0) {
            return Err("--timeout must be greater than zero".to_string());
        }
        if self.quiet && self.verbose {
            return Err("--quiet and --verbose cannot be used together".to_string());
        }
        Ok(())
    }

    /// Builds the library configuration these arguments describe
    pub fn repackage_config(&self) -> RepackageConfig {
        RepackageConfig {
            preference: self.execution.into(),
            force_local: self.force_local,
            assume_yes: self.assume_yes,
            script_dir: self.script_dir.clone(),
            output_dir: self.output_dir.clone(),
            task_timeout: self.timeout.map(Duration::from_secs),
            output_mode: if self.capture {
                OutputMode::Capture
            } else {
                OutputMode::Inherit
            },
            ..RepackageConfig::default()
        }
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,
    settings: RepackageConfig,
    capture: bool,
    quiet: bool,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            // JSON summaries own stdout.
            output: super::OutputManager::new(args.verbose, args.quiet || args.capture),
            settings: args.repackage_config(),
            capture: args.capture,
            quiet: args.quiet,
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Library configuration
    pub fn settings(&self) -> &RepackageConfig {
        &self.settings
    }

    /// Whether a JSON summary is printed instead of human-readable output
    pub fn is_capture(&self) -> bool {
        self.capture
    }

    /// Whether task output lines are echoed (to stderr under `--capture`)
    pub fn echo_task_output(&self) -> bool {
        !self.quiet
    }

    /// Print message
    pub fn println(&self, message: &str) {
        let _ = self.output.println(message);
    }

    /// Print progress message
    pub fn progress_println(&self, message: &str) {
        let _ = self.output.progress(message);
    }

    /// Print verbose message
    pub fn verbose_println(&self, message: &str) {
        let _ = self.output.verbose(message);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print warning message
    pub fn warning_println(&self, message: &str) {
        let _ = self.output.warn(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        let _ = self.output.success(message);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        let _ = self.output.indent(message);
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.output.is_quiet()
    }
}
