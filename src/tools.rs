//! Host-side lookup of the repackaging entry point and helper binaries.

use crate::error::{ArchitectureMismatch, ExecutionError};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// File name of the transformation entry point
pub const ENTRY_POINT: &str = "plugin_repackaging.sh";

/// Located entry point plus the directory helper binaries are searched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTools {
    entry_point: PathBuf,
}

impl HostTools {
    /// Finds `plugin_repackaging.sh`.
    ///
    /// Search order: `script_dir` (when given), the executable's directory,
    /// the current directory, `../bin` relative to it, then `cmd/repackage`.
    pub fn locate(script_dir: Option<&Path>) -> Result<Self, ExecutionError> {
        let mut dirs = Vec::new();
        if let Some(dir) = script_dir {
            dirs.push(dir.to_path_buf());
        }
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            dirs.push(exe_dir);
        }
        if let Ok(cwd) = std::env::current_dir() {
            dirs.push(cwd.clone());
            if let Some(parent) = cwd.parent() {
                dirs.push(parent.join("bin"));
            }
            dirs.push(cwd.join("cmd").join("repackage"));
        }
        Self::locate_in(&dirs)
    }

    /// Finds the entry point in the first of `dirs` that contains it
    pub fn locate_in(dirs: &[PathBuf]) -> Result<Self, ExecutionError> {
        let searched: Vec<PathBuf> = dirs.iter().map(|d| d.join(ENTRY_POINT)).collect();
        match searched.iter().find(|p| p.is_file()) {
            Some(found) => {
                // Local runs change the working directory.
                let entry_point = found
                    .absolutize()
                    .map(|p| p.into_owned())
                    .unwrap_or_else(|_| found.clone());
                log::debug!("Using entry point {}", entry_point.display());
                Ok(Self { entry_point })
            }
            None => Err(ExecutionError::EntryPointNotFound {
                script: ENTRY_POINT,
                searched,
            }),
        }
    }

    /// Path of `plugin_repackaging.sh`
    pub fn entry_point(&self) -> &Path {
        &self.entry_point
    }

    /// Directory holding the entry point
    pub fn script_dir(&self) -> &Path {
        self.entry_point.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Where a helper binary may live, in priority order
    pub fn helper_locations(&self, binary: &str) -> Vec<PathBuf> {
        let script_dir = self.script_dir();
        vec![
            script_dir.join(binary),
            script_dir.join("..").join("bin").join(binary),
            Path::new("..").join("bin").join(binary),
            Path::new("bin").join(binary),
        ]
    }

    /// First existing helper binary named `binary`
    pub fn find_helper(&self, binary: &str) -> Result<PathBuf, ArchitectureMismatch> {
        let searched = self.helper_locations(binary);
        match searched.iter().find(|p| p.is_file()) {
            Some(found) => Ok(found.clone()),
            None => Err(ArchitectureMismatch::MissingHelper {
                binary: binary.to_string(),
                searched,
            }),
        }
    }

    /// Sets mode 0755 on the entry point
    #[cfg(unix)]
    pub fn ensure_executable(&self) -> std::io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&self.entry_point, std::fs::Permissions::from_mode(0o755))
    }

    /// No-op where execute permission does not exist
    #[cfg(not(unix))]
    pub fn ensure_executable(&self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_directory_with_script_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join(ENTRY_POINT), "#!/bin/sh\n").unwrap();

        let tools = HostTools::locate_in(&[first.path().to_path_buf(), second.path().to_path_buf()])
            .unwrap();
        assert_eq!(tools.entry_point(), second.path().join(ENTRY_POINT));
        assert_eq!(tools.script_dir(), second.path());
    }

    #[test]
    fn test_missing_script_lists_every_location() {
        let dir = tempfile::tempdir().unwrap();
        let err = HostTools::locate_in(&[dir.path().to_path_buf()]).unwrap_err();
        match err {
            ExecutionError::EntryPointNotFound { script, searched } => {
                assert_eq!(script, ENTRY_POINT);
                assert_eq!(searched, vec![dir.path().join(ENTRY_POINT)]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_helper_found_next_to_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ENTRY_POINT), "").unwrap();
        std::fs::write(dir.path().join("dify-plugin-linux-amd64-5g"), "").unwrap();

        let tools = HostTools::locate_in(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(
            tools.find_helper("dify-plugin-linux-amd64-5g").unwrap(),
            dir.path().join("dify-plugin-linux-amd64-5g")
        );
    }

    #[test]
    fn test_missing_helper_names_binary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ENTRY_POINT), "").unwrap();

        let tools = HostTools::locate_in(&[dir.path().to_path_buf()]).unwrap();
        let err = tools.find_helper("dify-plugin-linux-riscv-5g-test").unwrap_err();
        match err {
            ArchitectureMismatch::MissingHelper { binary, searched } => {
                assert_eq!(binary, "dify-plugin-linux-riscv-5g-test");
                assert_eq!(searched.len(), 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_executable_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ENTRY_POINT), "#!/bin/sh\n").unwrap();
        let tools = HostTools::locate_in(&[dir.path().to_path_buf()]).unwrap();
        tools.ensure_executable().unwrap();

        let mode = std::fs::metadata(tools.entry_point()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
