//! Command line interface for dify_repackage.
//!
//! Parses arguments, wires the library components together and reports
//! progress with colored output.

mod args;
pub mod commands;
mod output;
mod prompt;

pub use args::{Args, Command, ExecutionArg, RuntimeConfig};
pub use commands::execute_command;
pub use output::{ConsoleSink, OutputManager};
pub use prompt::StdinConfirm;

use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute_command(args).await
}
