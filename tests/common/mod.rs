//! Shared test doubles.

#![allow(dead_code)]

use dify_repackage::docker::{
    ContainerSummary, DaemonClient, ImageSummary, PsFilter, RunningState,
};
use dify_repackage::error::DaemonError;
use dify_repackage::process::{LineSink, StreamKind};
use dify_repackage::resolver::Confirm;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory container daemon.
///
/// Files "inside" the container are tracked as a list of paths in copy order;
/// `find` returns them in that order.
#[derive(Default)]
pub struct FakeDaemon {
    pub containers: Vec<ContainerSummary>,
    pub images: Vec<ImageSummary>,
    pub os: String,
    pub arch: String,
    /// Files the task writes into the working directory when it runs
    pub produces: Vec<String>,
    /// Output lines the task prints
    pub prints: Vec<String>,
    pub task_exit_code: i32,
    /// The streamed task hits its time limit
    pub task_times_out: bool,
    pub fail_copy_to: bool,
    pub files: Mutex<Vec<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeDaemon {
    pub fn linux_amd64() -> Self {
        Self {
            os: "Linux".to_string(),
            arch: "x86_64".to_string(),
            ..Default::default()
        }
    }

    pub fn with_container(mut self, id: &str, name: &str, image: &str, state: RunningState) -> Self {
        self.containers.push(container(id, name, image, state));
        self
    }

    pub fn with_image(mut self, repository: &str, tag: &str) -> Self {
        self.images.push(ImageSummary {
            repository: repository.to_string(),
            tag: tag.to_string(),
        });
        self
    }

    pub fn with_file(self, path: &str) -> Self {
        self.files.lock().unwrap().push(path.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn files(&self) -> Vec<String> {
        self.files.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn container(id: &str, name: &str, image: &str, state: RunningState) -> ContainerSummary {
    ContainerSummary {
        id: id.to_string(),
        name: name.to_string(),
        image: image.to_string(),
        state,
    }
}

impl DaemonClient for FakeDaemon {
    async fn ps(&self, filter: PsFilter) -> Result<Vec<ContainerSummary>, DaemonError> {
        self.record(format!("ps {:?}", filter));
        Ok(self
            .containers
            .iter()
            .filter(|c| filter == PsFilter::All || c.state == RunningState::Running)
            .cloned()
            .collect())
    }

    async fn images(&self) -> Result<Vec<ImageSummary>, DaemonError> {
        self.record("images".to_string());
        Ok(self.images.clone())
    }

    async fn copy_to(
        &self,
        container: &str,
        host_path: &Path,
        container_path: &str,
    ) -> Result<(), DaemonError> {
        self.record(format!("cp {} {}:{}", host_path.display(), container, container_path));
        if self.fail_copy_to {
            return Err(DaemonError::NonZeroExit {
                command: "docker cp".to_string(),
                code: 1,
                stderr: "no space left on device".to_string(),
            });
        }
        self.files.lock().unwrap().push(container_path.to_string());
        Ok(())
    }

    async fn copy_from(
        &self,
        container: &str,
        container_path: &str,
        host_dir: &Path,
    ) -> Result<(), DaemonError> {
        self.record(format!("cp {}:{} {}", container, container_path, host_dir.display()));
        if !self.files().iter().any(|f| f == container_path) {
            return Err(DaemonError::NonZeroExit {
                command: "docker cp".to_string(),
                code: 1,
                stderr: format!("Could not find the file {}", container_path),
            });
        }
        let name = container_path.rsplit('/').next().unwrap_or(container_path);
        std::fs::write(host_dir.join(name), b"repackaged").map_err(|e| {
            DaemonError::CommandFailed {
                command: "docker cp".to_string(),
                reason: e.to_string(),
            }
        })
    }

    async fn exec(&self, container: &str, args: &[String]) -> Result<String, DaemonError> {
        self.record(format!("exec {} {}", container, args.join(" ")));
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match args.as_slice() {
            ["uname"] => Ok(format!("{}\n", self.os)),
            ["uname", "-m"] => Ok(format!("{}\n", self.arch)),
            ["find", dir, ..] => Ok(self
                .files()
                .iter()
                .filter(|f| f.starts_with(dir))
                .map(|f| format!("{}\n", f))
                .collect()),
            _ => Ok(String::new()),
        }
    }

    async fn exec_streaming(
        &self,
        container: &str,
        args: &[String],
        sink: &dyn LineSink,
    ) -> Result<(), DaemonError> {
        self.record(format!("exec-stream {} {}", container, args.join(" ")));
        for line in &self.prints {
            sink.line(StreamKind::Stdout, line);
        }
        if self.task_times_out {
            return Err(DaemonError::TimedOut {
                command: args.join(" "),
                secs: 1,
            });
        }
        if self.task_exit_code != 0 {
            sink.line(StreamKind::Stderr, "task failed");
            return Err(DaemonError::NonZeroExit {
                command: args.join(" "),
                code: self.task_exit_code,
                stderr: String::new(),
            });
        }
        let mut files = self.files.lock().unwrap();
        for produced in &self.produces {
            files.push(produced.clone());
        }
        Ok(())
    }
}

/// Confirmation channel with a fixed answer that counts how often it was asked
pub struct ScriptedConfirm {
    answer: bool,
    asked: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirm {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            asked: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn times_asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl Confirm for ScriptedConfirm {
    async fn ask(&self, prompt: &str) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer
    }
}

/// Host directory with `plugin_repackaging.sh` and the amd64/arm64 linux helpers
pub fn script_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("plugin_repackaging.sh"), "#!/bin/sh\n").unwrap();
    std::fs::write(dir.path().join("dify-plugin-linux-amd64-5g"), "elf").unwrap();
    std::fs::write(dir.path().join("dify-plugin-linux-arm64-5g"), "elf").unwrap();
    dir
}

/// Writes an empty package file named `name` into `dir`
pub fn package(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"PK").unwrap();
    path
}
