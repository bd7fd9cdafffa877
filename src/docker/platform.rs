//! OS/architecture detection and helper binary naming.
//!
//! The container is asked directly (`uname`, `uname -m`); the host platform
//! is never assumed to match it.

use super::client::DaemonClient;
use crate::error::{ArchitectureMismatch, StagingError};
use std::fmt;

/// Prefix of every helper binary file name
pub const HELPER_PREFIX: &str = "dify-plugin";

/// Suffix of every helper binary file name
pub const HELPER_SUFFIX: &str = "-5g";

/// An OS/architecture pair as reported by `uname`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Kernel name, lowercased (`linux`, `darwin`)
    pub os: String,
    /// Machine name, lowercased (`x86_64`, `aarch64`, ...)
    pub arch: String,
}

impl Platform {
    /// Builds a platform from raw `uname` output
    pub fn new(os: &str, arch: &str) -> Self {
        Self {
            os: os.trim().to_lowercase(),
            arch: arch.trim().to_lowercase(),
        }
    }

    /// The platform this process runs on
    pub fn host() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        Self::new(os, std::env::consts::ARCH)
    }

    /// Asks the container for its platform
    pub async fn of_container<D: DaemonClient>(
        client: &D,
        container: &str,
    ) -> Result<Self, StagingError> {
        let query = |args: &[&str]| {
            let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
            async move {
                client
                    .exec(container, &args)
                    .await
                    .map_err(|source| StagingError::PlatformQuery {
                        container: container.to_string(),
                        source,
                    })
            }
        };

        let os = query(&["uname"]).await?;
        let arch = query(&["uname", "-m"]).await?;
        let platform = Self::new(&os, &arch);
        log::info!(
            "Detected container OS: {}, architecture: {}",
            platform.os,
            platform.arch
        );
        Ok(platform)
    }

    /// File name of the helper binary built for this platform
    pub fn helper_binary_name(&self) -> Result<String, ArchitectureMismatch> {
        let unsupported = || ArchitectureMismatch::UnsupportedPlatform {
            os: self.os.clone(),
            arch: self.arch.clone(),
        };

        let os = match self.os.as_str() {
            "linux" => "linux",
            "darwin" => "darwin",
            _ => return Err(unsupported()),
        };
        let arch = match self.arch.as_str() {
            "x86_64" | "amd64" => "amd64",
            "aarch64" | "arm64" => "arm64",
            _ => return Err(unsupported()),
        };

        Ok(format!("{}-{}-{}{}", HELPER_PREFIX, os, arch, HELPER_SUFFIX))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
