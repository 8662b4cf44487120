//! External tool invocation.
//!
//! Every subprocess the pipeline starts (style checker, conda, the notebook
//! executor) goes through a [`CommandRunner`]. The production runner resolves
//! the program on `PATH`, captures its output, enforces a deadline, and kills
//! the child when the run is aborted.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::abort::AbortHandle;
use crate::error::{Error, Result};

/// A program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Program name or path
    pub program: String,

    /// Arguments
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Start building an invocation of `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code (`None` if terminated by a signal)
    pub status: Option<i32>,

    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,
}

impl ToolOutput {
    /// Whether the tool exited with status 0.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Turn a non-zero exit into [`Error::Subprocess`].
    pub fn into_result(self, tool: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::Subprocess {
                tool: tool.to_string(),
                status: self.status,
                stderr: self.stderr,
            })
        }
    }

    /// Stdout and stderr combined, for execution logs.
    pub fn transcript(&self) -> String {
        format!(
            "exit status: {}\n\n--- stdout ---\n{}\n--- stderr ---\n{}\n",
            self.status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "terminated".to_string()),
            self.stdout,
            self.stderr
        )
    }
}

/// Runs external tools.
///
/// Implementations must report a tool that cannot be found as
/// [`Error::ToolMissing`] and return `Ok` for any tool that ran to
/// completion, whatever its exit status.
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion and capture its output.
    fn run(&self, command: &ToolCommand) -> impl Future<Output = Result<ToolOutput>> + Send;
}

impl<R: CommandRunner> CommandRunner for &R {
    fn run(&self, command: &ToolCommand) -> impl Future<Output = Result<ToolOutput>> + Send {
        (**self).run(command)
    }
}

/// Configuration for [`SystemRunner`].
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Deadline for a single tool invocation
    pub timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3600),
        }
    }
}

impl RunnerConfig {
    /// Set the per-invocation deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Runs tools as real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    config: RunnerConfig,
    abort: AbortHandle,
}

impl SystemRunner {
    /// Create a runner that honors `abort`.
    pub fn new(config: RunnerConfig, abort: AbortHandle) -> Self {
        Self { config, abort }
    }

    /// Resolve a program name or path to an executable.
    fn resolve(program: &str) -> Result<PathBuf> {
        which::which(program).map_err(|_| Error::ToolMissing {
            tool: program.to_string(),
        })
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        if self.abort.is_aborted() {
            return Err(Error::Aborted);
        }

        let program = Self::resolve(&command.program)?;
        tracing::debug!("Running: {}", command);

        let child = Command::new(&program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::ToolMissing {
                    tool: command.program.clone(),
                },
                _ => Error::Io(e),
            })?;

        // Dropping the wait future drops the child, which kills it.
        let output = tokio::select! {
            result = tokio::time::timeout(self.config.timeout, child.wait_with_output()) => {
                match result {
                    Ok(output) => output?,
                    Err(_) => {
                        tracing::warn!("{} timed out after {:?}", command.program, self.config.timeout);
                        return Err(Error::Timeout {
                            tool: command.program.clone(),
                            after: self.config.timeout,
                        });
                    }
                }
            }
            _ = self.abort.aborted() => {
                tracing::warn!("Aborting {}", command.program);
                return Err(Error::Aborted);
            }
        };

        Ok(ToolOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
