//! Static analysis stage (`chasten analyze`).

use crate::artifact::ArtifactLocator;
use crate::config::PipelineConfig;
use crate::error::{AnalyzerError, Result};
use crate::runner::{CommandRunner, CommandSpec};
use crate::tool::ExternalTool;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Report produced by the static-analysis tool, kept opaque.
pub type AnalysisResult = Value;

/// Runs chasten and loads the report it saves.
#[derive(Debug, Clone)]
pub struct AnalysisStage {
    tool: ExternalTool,
    project_name: String,
    artifact_pattern: String,
    exclude: Vec<PathBuf>,
    timeout_secs: u64,
}

impl AnalysisStage {
    pub fn new(tool: ExternalTool, project_name: impl Into<String>) -> Self {
        Self {
            tool,
            project_name: project_name.into(),
            artifact_pattern: "*.json".to_string(),
            exclude: Vec::new(),
            timeout_secs: 0,
        }
    }

    /// Stage wired from a run configuration. The merged output file is
    /// never taken for chasten's report.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.analysis_tool.clone(), config.project_name.clone())
            .with_pattern(config.artifact_pattern.clone())
            .excluding(config.output_path())
            .with_timeout(config.command_timeout_secs)
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.artifact_pattern = pattern.into();
        self
    }

    pub fn excluding(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclude.push(path.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// The `chasten analyze` invocation for these paths.
    pub fn command(
        &self,
        search_path: &Path,
        save_directory: &Path,
        config_path: &Path,
    ) -> CommandSpec {
        let argv = self.tool.invocation([
            "analyze".to_string(),
            self.project_name.clone(),
            "--config".to_string(),
            config_path.display().to_string(),
            "--search-path".to_string(),
            search_path.display().to_string(),
            "--save-directory".to_string(),
            save_directory.display().to_string(),
            "--save".to_string(),
        ]);
        CommandSpec::new(argv).with_timeout(self.timeout_secs)
    }

    /// Run the analysis and return its parsed report.
    ///
    /// Only a report written or rewritten by this run is collected; files
    /// already in `save_directory` are left untouched. The report file is
    /// deleted before this returns, whether or not it parsed.
    pub async fn run(
        &self,
        search_path: &Path,
        save_directory: &Path,
        config_path: &Path,
    ) -> Result<AnalysisResult> {
        let spec = self.command(search_path, save_directory, config_path);
        let locator = self.locator(save_directory);
        let before = locator.snapshot()?;
        debug!(existing = before.len(), "Recorded files already in save directory");

        info!(command = %spec.display(), "Running static analysis");
        let output = CommandRunner::run_checked(&spec).await?;
        debug!(duration_ms = output.duration_ms, "Static analysis finished");

        Self::load(locator.changed_since(before))
    }

    /// Locate, read, remove and parse the newest report in `save_directory`.
    pub fn collect(&self, save_directory: &Path) -> Result<AnalysisResult> {
        Self::load(self.locator(save_directory))
    }

    fn locator(&self, save_directory: &Path) -> ArtifactLocator {
        let mut locator = ArtifactLocator::new(save_directory, self.artifact_pattern.clone());
        for path in &self.exclude {
            locator = locator.excluding(path.clone());
        }
        locator
    }

    fn load(locator: ArtifactLocator) -> Result<AnalysisResult> {
        let artifact = locator.latest()?;
        info!(path = %artifact.display(), "Loading analysis report");

        let content = fs::read_to_string(&artifact).map_err(|e| AnalyzerError::io(&artifact, e));
        fs::remove_file(&artifact).map_err(|e| AnalyzerError::io(&artifact, e))?;
        let content = content?;

        serde_json::from_str(&content).map_err(|source| AnalyzerError::ParseError {
            origin: artifact.display().to_string(),
            source,
        })
    }
}
