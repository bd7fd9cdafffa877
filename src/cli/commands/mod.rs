//! Command execution and failure reporting.
//!
//! Every command returns an exit code. Failures are printed with recovery
//! suggestions, or as a JSON failure record under `--capture`.

mod capabilities;
mod repackage;

use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::{FailureKind, RepackageError, Result};
use serde::Serialize;

use capabilities::execute_capabilities;
use repackage::execute_repackage;

/// JSON record printed for a failed command under `--capture`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureSummary {
    success: bool,
    failure_kind: FailureKind,
    error: String,
    suggestions: Vec<String>,
}

impl From<&RepackageError> for FailureSummary {
    fn from(e: &RepackageError) -> Self {
        Self {
            success: false,
            failure_kind: e.kind(),
            error: e.to_string(),
            suggestions: e.recovery_suggestions(),
        }
    }
}

/// Execute the main command based on parsed arguments
pub async fn execute_command(args: Args) -> Result<i32> {
    if let Err(validation_error) = args.validate() {
        let output = super::OutputManager::new(false, false);
        output.error(&format!("Invalid arguments: {}", validation_error));
        return Ok(1);
    }

    let config = RuntimeConfig::from(&args);

    let result = match &args.command {
        Command::Capabilities { json } => execute_capabilities(*json, &config).await,
        task => execute_repackage(task, &config).await,
    };

    match result {
        Ok(exit_code) => Ok(exit_code),
        Err(e) => {
            log::debug!("Command '{}' failed: {:?}", args.command.name(), e);
            if config.is_capture() {
                let _ = config
                    .output()
                    .json(&serde_json::to_string_pretty(&FailureSummary::from(&e))?);
            }

            config.error_println(&format!(
                "Command '{}' failed: {}",
                args.command.name(),
                e
            ));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() && !config.is_quiet() {
                config.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    config.println(&format!("  • {}", suggestion));
                }
            }

            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use std::path::PathBuf;

    #[test]
    fn test_failure_summary_json() {
        let err = RepackageError::from(TaskError::FileNotFound {
            path: PathBuf::from("/nope.difypkg"),
        });
        let json = serde_json::to_value(FailureSummary::from(&err)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["failureKind"], "task");
        assert!(json["error"].as_str().unwrap().contains("/nope.difypkg"));
    }
}
