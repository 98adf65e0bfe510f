//! External command execution.

use crate::error::{AnalyzerError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// A command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Working directory for the child. `None` inherits ours.
    pub cwd: Option<PathBuf>,

    /// Timeout in seconds (0 = wait forever).
    pub timeout_secs: u64,
}

impl CommandSpec {
    /// Create a command from an argument vector.
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            cwd: None,
            timeout_secs: 0,
        }
    }

    /// Run the command from `dir` instead of the current directory.
    pub fn in_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Kill the command if it runs longer than `secs` seconds.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Shell-like rendering used in logs and errors.
    pub fn display(&self) -> String {
        self.command.join(" ")
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Whether the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands to completion, capturing their output.
pub struct CommandRunner;

impl CommandRunner {
    /// Execute a command and return its output whatever the exit status.
    ///
    /// Fails only when the process cannot be launched or times out.
    pub async fn run(spec: &CommandSpec) -> Result<CommandOutput> {
        let start = Instant::now();

        let (exe, args) = spec
            .command
            .split_first()
            .ok_or(AnalyzerError::EmptyCommand)?;

        let mut command = Command::new(exe);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }

        debug!(command = %spec.display(), cwd = ?spec.cwd, "Spawning command");

        let child = command.spawn().map_err(|source| AnalyzerError::CommandLaunch {
            program: exe.clone(),
            source,
        })?;

        let waited = if spec.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(spec.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| AnalyzerError::CommandTimedOut {
                command: spec.display(),
                timeout_secs: spec.timeout_secs,
            })?
        } else {
            child.wait_with_output().await
        };
        let output = waited.map_err(|source| AnalyzerError::CommandLaunch {
            program: exe.clone(),
            source,
        })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);

        debug!(command = %spec.display(), exit_code, duration_ms, "Command finished");

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms,
        })
    }

    /// Execute a command, turning a non-zero exit into `CommandFailed`.
    ///
    /// The child's stderr is carried in the error untouched.
    pub async fn run_checked(spec: &CommandSpec) -> Result<CommandOutput> {
        let output = Self::run(spec).await?;
        if !output.success() {
            return Err(AnalyzerError::CommandFailed {
                command: spec.display(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_output_success() {
        let output = CommandOutput {
            exit_code: 0,
            stdout: "".to_string(),
            stderr: "".to_string(),
            duration_ms: 100,
        };
        assert!(output.success());

        let failed = CommandOutput {
            exit_code: 1,
            stderr: "error".to_string(),
            ..output
        };
        assert!(!failed.success());
    }

    #[test]
    fn test_command_spec_builders() {
        let spec = CommandSpec::new(["mutmut", "run"]).in_dir("/tmp").with_timeout(30);
        assert_eq!(spec.command, vec!["mutmut".to_string(), "run".to_string()]);
        assert_eq!(spec.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(spec.timeout_secs, 30);
        assert_eq!(spec.display(), "mutmut run");
    }

    #[tokio::test]
    async fn test_execute_simple_command() {
        let spec = CommandSpec::new(["echo", "hello"]);

        let output = CommandRunner::run(&spec).await.expect("execute failed");
        assert!(output.success());
        assert_eq!(output.exit_code, 0);
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_execute_failing_command() {
        let spec = CommandSpec::new(["false"]);

        let output = CommandRunner::run(&spec).await.expect("execute failed");
        assert!(!output.success());
        assert_ne!(output.exit_code, 0);
    }

    #[tokio::test]
    async fn test_run_checked_carries_stderr() {
        let spec = CommandSpec::new(["sh", "-c", "echo boom >&2; exit 3"]);

        match CommandRunner::run_checked(&spec).await {
            Err(AnalyzerError::CommandFailed {
                exit_code, stderr, ..
            }) => {
                assert_eq!(exit_code, 3);
                assert_eq!(stderr, "boom\n");
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_executable_is_launch_error() {
        let spec = CommandSpec::new(["/nonexistent-binary-that-does-not-exist"]);

        let err = CommandRunner::run(&spec).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::CommandLaunch { .. }));
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let spec = CommandSpec::new(Vec::<String>::new());

        let err = CommandRunner::run(&spec).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::EmptyCommand));
    }

    #[tokio::test]
    async fn test_runs_in_given_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let spec = CommandSpec::new(["pwd"]).in_dir(dir.path());

        let output = CommandRunner::run(&spec).await.expect("execute failed");
        let reported = PathBuf::from(output.stdout.trim());
        assert_eq!(
            reported.canonicalize().expect("canonicalize"),
            dir.path().canonicalize().expect("canonicalize")
        );
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let spec = CommandSpec::new(["sleep", "5"]).with_timeout(1);

        let err = CommandRunner::run(&spec).await.unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::CommandTimedOut { timeout_secs: 1, .. }
        ));
    }
}
