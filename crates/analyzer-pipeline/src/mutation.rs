//! Mutation testing stage (`mutmut run` + `mutmut junitxml` + junit2json).

use crate::config::PipelineConfig;
use crate::error::{AnalyzerError, Result};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};
use crate::tool::ExternalTool;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, info, warn};

/// Converted mutation report, kept opaque.
pub type MutationResult = Value;

/// Runs commands as if launched from a project directory.
///
/// The directory is handed to each child process; the pipeline's own working
/// directory is never changed, so there is nothing to restore on any exit path.
#[derive(Debug, Clone)]
pub struct WorkingDirectoryScope {
    dir: PathBuf,
}

impl WorkingDirectoryScope {
    /// Scope rooted at `dir`, which must be an existing directory.
    ///
    /// A relative `dir` is resolved against the current directory here, so
    /// paths derived from the scope stay valid inside the child process.
    pub fn enter(dir: &Path) -> Result<Self> {
        let metadata = fs::metadata(dir).map_err(|e| AnalyzerError::io(dir, e))?;
        if !metadata.is_dir() {
            return Err(AnalyzerError::io(
                dir,
                std::io::Error::new(ErrorKind::NotFound, "not a directory"),
            ));
        }
        let dir = std::path::absolute(dir).map_err(|e| AnalyzerError::io(dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A command that will run from the scope's directory.
    pub fn command(&self, argv: Vec<String>) -> CommandSpec {
        CommandSpec::new(argv).in_dir(&self.dir)
    }
}

/// Intermediate XML report that lives for one stage run.
///
/// Removed by [`ScratchReport::close`], or on drop if the stage bails out early.
struct ScratchReport {
    path: PathBuf,
    temp: Option<TempPath>,
    closed: bool,
}

impl ScratchReport {
    /// Write `contents` to a fresh file in `dir`, or exclusively to `fixed`.
    fn create(dir: &Path, fixed: Option<&Path>, contents: &str) -> Result<Self> {
        match fixed {
            Some(fixed) => {
                let path = dir.join(fixed);
                let mut file = OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .map_err(|e| match e.kind() {
                        ErrorKind::AlreadyExists => {
                            AnalyzerError::FileConflict { path: path.clone() }
                        }
                        _ => AnalyzerError::io(&path, e),
                    })?;
                let report = Self {
                    path,
                    temp: None,
                    closed: false,
                };
                file.write_all(contents.as_bytes())
                    .map_err(|e| AnalyzerError::io(&report.path, e))?;
                Ok(report)
            }
            None => {
                let mut file = tempfile::Builder::new()
                    .prefix("mutation-")
                    .suffix(".xml")
                    .tempfile_in(dir)
                    .map_err(|e| AnalyzerError::io(dir, e))?;
                file.write_all(contents.as_bytes())
                    .map_err(|e| AnalyzerError::io(file.path(), e))?;
                let temp = file.into_temp_path();
                Ok(Self {
                    path: temp.to_path_buf(),
                    temp: Some(temp),
                    closed: false,
                })
            }
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file, reporting failure.
    fn close(mut self) -> Result<()> {
        self.closed = true;
        let removed = match self.temp.take() {
            Some(temp) => temp.close(),
            None => fs::remove_file(&self.path),
        };
        removed.map_err(|e| AnalyzerError::io(&self.path, e))
    }
}

impl Drop for ScratchReport {
    fn drop(&mut self) {
        // TempPath cleans up after itself.
        if !self.closed && self.temp.is_none() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "Failed to remove scratch report");
            }
        }
    }
}

/// Whether a `mutmut run` exit status means the run itself broke.
///
/// mutmut reports results as bit flags: 1 is a fatal error, while 2, 4 and 8
/// flag surviving, timed-out and suspicious mutants.
pub fn mutmut_run_failed(exit_code: i32) -> bool {
    exit_code < 0 || (exit_code & 1) == 1
}

/// Runs mutmut in the target project and converts its JUnit report to JSON.
#[derive(Debug, Clone)]
pub struct MutationStage {
    tool: ExternalTool,
    converter: Vec<String>,
    report_path: Option<PathBuf>,
    timeout_secs: u64,
}

impl MutationStage {
    pub fn new(tool: ExternalTool, converter: Vec<String>) -> Self {
        Self {
            tool,
            converter,
            report_path: None,
            timeout_secs: 0,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        let stage = Self::new(config.mutation_tool.clone(), config.converter.clone())
            .with_timeout(config.command_timeout_secs);
        match &config.mutation_report_path {
            Some(path) => stage.with_report_path(path.clone()),
            None => stage,
        }
    }

    /// Write the intermediate report to this fixed path instead of a temp file.
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Mutate and test the project at `search_path`, returning the converted report.
    pub async fn run(&self, search_path: &Path) -> Result<MutationResult> {
        let scope = WorkingDirectoryScope::enter(search_path)?;

        let run = self.exec(&scope, self.tool.invocation(["run"])).await?;
        if mutmut_run_failed(run.exit_code) {
            return Err(AnalyzerError::CommandFailed {
                command: self.tool.invocation(["run"]).join(" "),
                exit_code: run.exit_code,
                stderr: run.stderr,
            });
        }
        info!(
            exit_code = run.exit_code,
            duration_ms = run.duration_ms,
            "Mutation run finished"
        );

        let junit = self
            .exec_checked(&scope, self.tool.invocation(["junitxml"]))
            .await?;

        let report =
            ScratchReport::create(scope.dir(), self.report_path.as_deref(), &junit.stdout)?;
        debug!(path = %report.path().display(), "Wrote JUnit report");

        let mut argv = self.converter.clone();
        argv.push(report.path().display().to_string());
        let converted = self.exec_checked(&scope, argv).await?;
        report.close()?;

        serde_json::from_str(&converted.stdout).map_err(|source| AnalyzerError::ParseError {
            origin: self.converter.join(" "),
            source,
        })
    }

    async fn exec(
        &self,
        scope: &WorkingDirectoryScope,
        argv: Vec<String>,
    ) -> Result<CommandOutput> {
        let spec = scope.command(argv).with_timeout(self.timeout_secs);
        info!(command = %spec.display(), cwd = %scope.dir().display(), "Running mutation step");
        CommandRunner::run(&spec).await
    }

    async fn exec_checked(
        &self,
        scope: &WorkingDirectoryScope,
        argv: Vec<String>,
    ) -> Result<CommandOutput> {
        let spec = scope.command(argv).with_timeout(self.timeout_secs);
        info!(command = %spec.display(), cwd = %scope.dir().display(), "Running mutation step");
        CommandRunner::run_checked(&spec).await
    }
}
