//! Deadline-aware subprocess execution for Orbit activities.
//!
//! Git and other external tools are driven through [`CommandRunner`], a
//! capability trait the activity layer injects so tests can substitute a
//! recording fake. The system implementation polls the child and kills it
//! when the deadline elapses, so a cancelled activity never leaves a
//! subprocess running.
//!
//! # Example
//!
//! ```no_run
//! use orbit_process::{CommandRunner, CommandSpec, SystemRunner};
//! use std::path::Path;
//!
//! let runner = SystemRunner;
//! let out = runner
//!     .run(&CommandSpec::new("git", ["status", "--porcelain"]).current_dir(Path::new(".")))
//!     .expect("run git");
//! assert!(out.success());
//! ```

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A fully described command invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; inherited from the parent process when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_dir: Option<PathBuf>,
    /// Extra environment variables layered over the inherited environment.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Wall-clock bound; the child is killed when it elapses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            current_dir: None,
            env: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Rendering used in error contexts; arguments only, no environment.
    pub fn display(&self) -> String {
        let mut s = self.program.clone();
        for a in &self.args {
            s.push(' ');
            s.push_str(a);
        }
        s
    }
}

/// Captured result of a command execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit code, or -1 when the process was killed or had none.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Whether execution exceeded the spec's timeout.
    pub timed_out: bool,
    /// Total wall-clock duration.
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// stdout and stderr joined, for matching against tool messages that may
    /// land on either stream.
    pub fn combined(&self) -> String {
        let mut s = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !s.is_empty() && !s.ends_with('\n') {
                s.push('\n');
            }
            s.push_str(&self.stderr);
        }
        s
    }
}

/// Capability trait for executing commands.
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Real subprocess execution with kill-on-deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let start = Instant::now();

        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let Some(timeout) = spec.timeout else {
            let output = command
                .output()
                .with_context(|| format!("failed to run command: {}", spec.display()))?;
            return Ok(CommandOutput {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                timed_out: false,
                duration: start.elapsed(),
            });
        };

        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn command: {}", spec.display()))?;

        let deadline = Instant::now() + timeout;
        loop {
            match child
                .try_wait()
                .with_context(|| format!("failed to poll command: {}", spec.display()))?
            {
                Some(status) => {
                    return Ok(CommandOutput {
                        exit_code: status.code().unwrap_or(-1),
                        stdout: read_pipe(child.stdout.take()),
                        stderr: read_pipe(child.stderr.take()),
                        timed_out: false,
                        duration: start.elapsed(),
                    });
                }
                None => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();

                        let mut stderr = read_pipe(child.stderr.take());
                        stderr.push_str(&format!(
                            "\n{} timed out after {}",
                            spec.program,
                            humantime::format_duration(timeout)
                        ));

                        return Ok(CommandOutput {
                            exit_code: -1,
                            stdout: read_pipe(child.stdout.take()),
                            stderr,
                            timed_out: true,
                            duration: start.elapsed(),
                        });
                    }

                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }
    }
}

fn read_pipe<R: Read>(stream: Option<R>) -> String {
    let mut buffer = Vec::new();
    if let Some(mut s) = stream {
        let _ = s.read_to_end(&mut buffer);
    }
    String::from_utf8_lossy(&buffer).to_string()
}

/// Check if a command exists in PATH.
pub fn command_exists(program: &str) -> bool {
    which::which(program).is_ok()
}
