//! Host probes.
//!
//! Every probe is a read-only query of host state with a bounded wait. A
//! missing tool, a non-zero exit, or a timeout all mean "not available";
//! nothing here returns an error.

use regex::Regex;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Timeout for a single tool probe (`docker info`, `python3 --version`, ...)
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for one network reachability attempt
pub const NETWORK_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Reachability attempts before the network is declared unavailable
pub const NETWORK_PROBE_ATTEMPTS: usize = 3;

/// Host used for the reachability heuristic
pub const DEFAULT_NETWORK_HOST: &str = "pypi.org";

/// Substring identifying the plugin daemon image family
pub const DAEMON_IMAGE_MARKER: &str = "dify-plugin-daemon";

/// Runtime commands, most preferred first
const RUNTIME_COMMANDS: &[&str] = &["python3.12", "python3", "python"];

/// Package manager commands, most preferred first
const PACKAGE_MANAGER_COMMANDS: &[&str] = &["pip3", "pip"];

/// Well-known absolute locations of the docker CLI, in priority order
#[cfg(target_os = "windows")]
const DOCKER_PATHS: &[&str] = &[
    r"C:\Program Files\Docker\Docker\resources\bin\docker.exe",
    r"C:\ProgramData\DockerDesktop\version-bin\docker.exe",
    r"C:\Windows\System32\docker.exe",
];

#[cfg(target_os = "macos")]
const DOCKER_PATHS: &[&str] = &[
    "/usr/local/bin/docker",    // Intel Homebrew
    "/opt/homebrew/bin/docker", // Apple Silicon Homebrew
    "/usr/bin/docker",
];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const DOCKER_PATHS: &[&str] = &["/usr/bin/docker", "/usr/local/bin/docker", "/snap/bin/docker"];

static PYTHON_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Python\s+(\d+)\.(\d+)").expect("Python version regex is valid")
});

/// A detected language runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    /// Command that answered the version query
    pub command: String,
    /// Version string as reported (e.g. `Python 3.12.4`)
    pub version: String,
    /// Whether the version is 3.12 or newer
    pub ideal: bool,
}

/// Raw results of one probe pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResults {
    /// A docker CLI binary was found
    pub docker_available: bool,
    /// `docker info` succeeded
    pub docker_running: bool,
    /// Running containers whose name contains "plugin", in daemon order
    pub plugin_containers: Vec<String>,
    /// A plugin daemon image exists, or a container was created from one
    pub daemon_image_present: bool,
    /// Detected Python 3 runtime
    pub runtime: Option<RuntimeInfo>,
    /// `pip3`/`pip` answered
    pub package_manager_available: bool,
    /// `unzip` answered
    pub archive_tool_available: bool,
    /// Reachability probe succeeded at least once
    pub network_available: bool,
}

/// The set of host probes, parameterized by the reachability target
#[derive(Debug, Clone)]
pub struct ProbeSet {
    network_host: String,
}

impl Default for ProbeSet {
    fn default() -> Self {
        Self::new(DEFAULT_NETWORK_HOST)
    }
}

impl ProbeSet {
    /// Creates a probe set that checks reachability of `network_host`
    pub fn new(network_host: impl Into<String>) -> Self {
        Self {
            network_host: network_host.into(),
        }
    }

    /// Runs every probe. Container checks short-circuit when no docker CLI exists.
    pub fn run(&self) -> ProbeResults {
        let results = ProbeResults {
            runtime: python_runtime(),
            package_manager_available: package_manager_available(),
            archive_tool_available: archive_tool_available(),
            network_available: network_reachable(&self.network_host),
            ..self.run_daemon_checks()
        };
        log::debug!("Probe results: {:?}", results);
        results
    }

    /// Runs only the container daemon probes; everything else stays unset.
    pub fn run_daemon_checks(&self) -> ProbeResults {
        let Some(docker) = docker_binary() else {
            return ProbeResults::default();
        };
        ProbeResults {
            docker_available: true,
            docker_running: daemon_running(&docker),
            plugin_containers: plugin_containers(&docker),
            daemon_image_present: daemon_image_present(&docker),
            ..ProbeResults::default()
        }
    }
}

/// Resolves the docker CLI: well-known paths first, then `PATH`.
pub fn docker_binary() -> Option<PathBuf> {
    DOCKER_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
        .or_else(|| which::which("docker").ok())
}

/// Daemon liveness: zero exit of `docker info`
pub fn daemon_running(docker: &Path) -> bool {
    status_ok(docker, &["info"], PROBE_TIMEOUT)
}

/// Running containers whose name contains "plugin" (case-insensitive)
pub fn plugin_containers(docker: &Path) -> Vec<String> {
    let Some(output) = capture_stdout(docker, &["ps", "--format", "{{.Names}}"], PROBE_TIMEOUT)
    else {
        return Vec::new();
    };

    let names: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter(|name| name.to_lowercase().contains("plugin"))
        .map(str::to_string)
        .collect();
    log::debug!("Plugin containers found: {:?}", names);
    names
}

/// Whether any image, or any container's image, belongs to the daemon family
pub fn daemon_image_present(docker: &Path) -> bool {
    let listings: [&[&str]; 2] = [
        &["images", "--format", "{{.Repository}}"],
        &["ps", "-a", "--format", "{{.Image}}"],
    ];
    listings.iter().any(|args| {
        capture_stdout(docker, args, PROBE_TIMEOUT)
            .is_some_and(|out| out.to_lowercase().contains(DAEMON_IMAGE_MARKER))
    })
}

/// Extracts `(major, minor)` from a `Python X.Y[.Z]` banner
pub fn parse_python_version(banner: &str) -> Option<(u32, u32)> {
    let caps = PYTHON_VERSION.captures(banner)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    Some((major, minor))
}

/// First runtime command that reports a Python 3.x version
pub fn python_runtime() -> Option<RuntimeInfo> {
    RUNTIME_COMMANDS.iter().find_map(|command| {
        let banner = capture_stdout(command, &["--version"], PROBE_TIMEOUT)?;
        let (major, minor) = parse_python_version(&banner)?;
        if major != 3 {
            return None;
        }
        Some(RuntimeInfo {
            command: command.to_string(),
            version: banner.trim().to_string(),
            ideal: minor >= 12,
        })
    })
}

/// `pip3 --version` or `pip --version` succeeds
pub fn package_manager_available() -> bool {
    PACKAGE_MANAGER_COMMANDS
        .iter()
        .any(|command| status_ok(command, &["--version"], PROBE_TIMEOUT))
}

/// `unzip -v` succeeds
pub fn archive_tool_available() -> bool {
    status_ok("unzip", &["-v"], PROBE_TIMEOUT)
}

/// Up to [`NETWORK_PROBE_ATTEMPTS`] pings; any success is enough.
pub fn network_reachable(host: &str) -> bool {
    let args = ping_args(host);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    (0..NETWORK_PROBE_ATTEMPTS).any(|attempt| {
        let ok = status_ok("ping", &args, NETWORK_PROBE_TIMEOUT);
        log::debug!("Reachability attempt {} for {}: {}", attempt + 1, host, ok);
        ok
    })
}

fn ping_args(host: &str) -> Vec<String> {
    let args: &[&str] = match std::env::consts::OS {
        "windows" => &["-n", "1", "-w", "1000"],
        "macos" => &["-c", "1", "-W", "1000"],
        _ => &["-c", "1", "-W", "1"],
    };
    args.iter()
        .map(|a| a.to_string())
        .chain(std::iter::once(host.to_string()))
        .collect()
}

/// Whether this process already runs inside a container
pub fn inside_container() -> bool {
    inside_container_at(Path::new("/.dockerenv"), Path::new("/proc/self/cgroup"))
}

/// Container-marker check against explicit marker and cgroup paths
pub fn inside_container_at(marker: &Path, cgroup: &Path) -> bool {
    if marker.exists() {
        return true;
    }
    std::fs::read_to_string(cgroup).is_ok_and(|contents| contents.contains("docker"))
}

/// Runs `program args` with output discarded; true on zero exit within `timeout`.
fn status_ok(program: impl AsRef<OsStr>, args: &[&str], timeout: Duration) -> bool {
    let mut child = match Command::new(program.as_ref())
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(_) => return false,
    };

    match child.wait_timeout(timeout) {
        Ok(Some(status)) => status.success(),
        Ok(None) | Err(_) => {
            let _ = child.kill();
            let _ = child.wait();
            false
        }
    }
}

/// Runs `program args` and returns stdout when it exits zero within `timeout`.
fn capture_stdout(program: impl AsRef<OsStr>, args: &[&str], timeout: Duration) -> Option<String> {
    let mut child = Command::new(program.as_ref())
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    // Drain on a separate thread so a chatty command cannot fill the pipe and stall.
    let mut stdout = child.stdout.take()?;
    let reader = std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = stdout.read_to_string(&mut buf);
        buf
    });

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => Some(status),
        Ok(None) | Err(_) => {
            let _ = child.kill();
            let _ = child.wait();
            None
        }
    };

    let output = reader.join().ok()?;
    status.filter(|s| s.success()).map(|_| output)
}
