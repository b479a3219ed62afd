//! External command execution
//!
//! Every privileged operation the engine performs goes through
//! [`CommandRunner`]. Commands are invoked with argument lists, never a
//! shell string, and failures come back as values rather than errors so
//! callers decide what is fatal.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured outcome of one subprocess invocation.
#[derive(Debug, Clone)]
pub struct CmdOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// The most useful text to show an operator: stderr when present,
    /// stdout otherwise.
    pub fn diagnostic(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

/// Runs an external program and captures its outcome.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> CmdOutput;
}

/// [`CommandRunner`] backed by real subprocesses.
///
/// A hung external command would otherwise stall an apply sequence
/// indefinitely, so every invocation is bounded by `timeout`.
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[&str]) -> CmdOutput {
        debug!(program, ?args, "running command");

        let result = tokio::time::timeout(
            self.timeout,
            Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output(),
        )
        .await;

        let output = match result {
            Err(_) => {
                warn!(program, ?args, timeout = ?self.timeout, "command timed out");
                return CmdOutput::failed(format!(
                    "{program} timed out after {}s",
                    self.timeout.as_secs()
                ));
            }
            // spawn failure: executable missing, permissions
            Ok(Err(e)) => {
                warn!(program, ?args, error = %e, "failed to run command");
                return CmdOutput::failed(e.to_string());
            }
            Ok(Ok(output)) => output,
        };

        let out = CmdOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !out.success {
            warn!(program, ?args, stderr = %out.stderr.trim(), "command failed");
        }
        out
    }
}
