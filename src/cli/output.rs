//! Colored terminal output for repackaging operations
//!
//! Provides consistent, colored CLI output with proper formatting

use crate::process::{LineSink, StreamKind};
use std::io::Write;
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Output manager for consistent colored terminal output
#[derive(Debug)]
pub struct OutputManager {
    bufwtr: BufferWriter,
    verbose: bool,
    quiet: bool,
}

impl Clone for OutputManager {
    fn clone(&self) -> Self {
        Self::new(self.verbose, self.quiet)
    }
}

impl OutputManager {
    /// Create a new output manager
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            bufwtr: BufferWriter::stdout(ColorChoice::Auto),
            verbose,
            quiet,
        }
    }

    fn emit(&self, symbol: &str, symbol_color: ColorSpec, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut buffer = self.bufwtr.buffer();
        let _ = buffer.set_color(&symbol_color);
        let _ = write!(&mut buffer, "{}", symbol);
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, " {}", message);
        self.bufwtr.print(&buffer)
    }

    /// Print a success message
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.emit(
            "✓",
            ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true).clone(),
            message,
        )
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut buffer = self.bufwtr.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        let _ = write!(&mut buffer, "⚠");
        let _ = buffer.reset();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
        let _ = writeln!(&mut buffer, " {}", message);
        let _ = buffer.reset();
        self.bufwtr.print(&buffer)
    }

    /// Print an error message (always shown)
    pub fn error(&self, message: &str) {
        let bufwtr = BufferWriter::stderr(ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();

        if buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true)).is_err()
            || write!(&mut buffer, "✗").is_err()
            || buffer.reset().is_err()
            || buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red))).is_err()
            || writeln!(&mut buffer, " {}", message).is_err()
            || buffer.reset().is_err()
            || bufwtr.print(&buffer).is_err()
        {
            // Stderr failed - fallback to stdout as last resort
            println!("[STDERR ERROR] ✗ {}", message);
        }
    }

    /// Print a verbose/debug message (only in verbose mode)
    pub fn verbose(&self, message: &str) -> std::io::Result<()> {
        if !self.verbose {
            return Ok(());
        }
        self.emit("→", ColorSpec::new().set_fg(Some(Color::Blue)).clone(), message)
    }

    /// Print a progress message
    pub fn progress(&self, message: &str) -> std::io::Result<()> {
        self.emit("⋯", ColorSpec::new().set_fg(Some(Color::Magenta)).clone(), message)
    }

    /// Print a section header
    pub fn section(&self, title: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer);
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true));
        let _ = writeln!(&mut buffer, "═══ {} ═══", title);
        let _ = buffer.reset();
        self.bufwtr.print(&buffer)
    }

    /// Print indented text (for sub-items)
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer, "    {}", message);
        self.bufwtr.print(&buffer)
    }

    /// Print a plain message (respects quiet mode)
    pub fn println(&self, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer, "{}", message);
        self.bufwtr.print(&buffer)
    }

    /// Print machine-readable output (ignores quiet mode)
    pub fn json(&self, payload: &str) -> std::io::Result<()> {
        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer, "{}", payload);
        self.bufwtr.print(&buffer)
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}

/// Echoes task output to the terminal as it arrives.
///
/// stderr lines are drawn in a muted color. When `to_stderr` is set everything goes to
/// stderr, keeping stdout free for a JSON summary.
#[derive(Debug)]
pub struct ConsoleSink {
    bufwtr: BufferWriter,
    quiet: bool,
}

impl ConsoleSink {
    /// Creates a sink writing to stdout, or to stderr when `to_stderr` is set
    pub fn new(to_stderr: bool, quiet: bool) -> Self {
        let bufwtr = if to_stderr {
            BufferWriter::stderr(ColorChoice::Auto)
        } else {
            BufferWriter::stdout(ColorChoice::Auto)
        };
        Self { bufwtr, quiet }
    }
}

impl LineSink for ConsoleSink {
    fn line(&self, stream: StreamKind, line: &str) {
        if self.quiet {
            return;
        }

        let mut buffer = self.bufwtr.buffer();
        if stream == StreamKind::Stderr {
            let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::White)));
        }
        let _ = writeln!(&mut buffer, "    {}", line);
        let _ = buffer.reset();
        let _ = self.bufwtr.print(&buffer);
    }
}
