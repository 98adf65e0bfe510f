//! Pipeline orchestration: tool checks, both stages, aggregation.

use crate::aggregate::ResultAggregator;
use crate::analysis::AnalysisStage;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::mutation::MutationStage;
use crate::tool::{ExternalTool, ToolAvailability};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

/// Orchestrator states, in traversal order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Start,
    CheckAnalysisTool,
    CheckMutationTool,
    RunAnalysis,
    RunMutation,
    Aggregate,
    Done,
    Failed,
}

impl PipelineState {
    /// Whether the orchestrator stops here.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Start => "START",
            PipelineState::CheckAnalysisTool => "CHECK_ANALYSIS_TOOL",
            PipelineState::CheckMutationTool => "CHECK_MUTATION_TOOL",
            PipelineState::RunAnalysis => "RUN_ANALYSIS",
            PipelineState::RunMutation => "RUN_MUTATION",
            PipelineState::Aggregate => "AGGREGATE",
            PipelineState::Done => "DONE",
            PipelineState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// Identifier used in this run's log lines.
    pub run_id: Uuid,

    pub started_at: DateTime<Utc>,

    /// Where the combined result was written.
    pub output_path: PathBuf,

    /// Tools that had to be installed during this run.
    pub installed_tools: Vec<String>,

    /// States visited, from START to DONE.
    pub transitions: Vec<PipelineState>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

/// Sequences the pipeline for one configuration.
///
/// Every step is awaited before the next begins. Any error moves the
/// orchestrator to FAILED and nothing after it runs; the combined result is
/// only written once both stages have succeeded.
pub struct Orchestrator {
    config: PipelineConfig,
    availability: ToolAvailability,
    state: PipelineState,
    transitions: Vec<PipelineState>,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig) -> Self {
        let availability = ToolAvailability::new(config.installer.clone())
            .with_timeout(config.command_timeout_secs);
        Self {
            config,
            availability,
            state: PipelineState::Start,
            transitions: vec![PipelineState::Start],
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Every state entered so far, including FAILED if reached.
    pub fn transitions(&self) -> &[PipelineState] {
        &self.transitions
    }

    /// Run the pipeline from START to DONE.
    pub async fn run(&mut self) -> Result<PipelineOutcome> {
        let start = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();

        info!(
            run_id = %run_id,
            search_path = %self.config.search_path.display(),
            save_directory = %self.config.save_directory.display(),
            "Starting analysis pipeline"
        );

        match self.execute().await {
            Ok((output_path, installed_tools)) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                info!(
                    run_id = %run_id,
                    output = %output_path.display(),
                    duration_ms,
                    "Analysis pipeline completed successfully"
                );
                Ok(PipelineOutcome {
                    run_id,
                    started_at,
                    output_path,
                    installed_tools,
                    transitions: self.transitions.clone(),
                    duration_ms,
                })
            }
            Err(e) => {
                let failed_in = self.state;
                self.enter(PipelineState::Failed);
                error!(
                    run_id = %run_id,
                    state = %failed_in,
                    error = %e,
                    "Analysis pipeline failed"
                );
                Err(e)
            }
        }
    }

    async fn execute(&mut self) -> Result<(PathBuf, Vec<String>)> {
        let mut installed_tools = Vec::new();

        self.enter(PipelineState::CheckAnalysisTool);
        let analysis_tool = self.config.analysis_tool.clone();
        if self.check_tool(&analysis_tool).await? {
            installed_tools.push(analysis_tool.name);
        }

        self.enter(PipelineState::CheckMutationTool);
        let mutation_tool = self.config.mutation_tool.clone();
        if self.check_tool(&mutation_tool).await? {
            installed_tools.push(mutation_tool.name);
        }

        self.enter(PipelineState::RunAnalysis);
        let analysis = AnalysisStage::from_config(&self.config)
            .run(
                &self.config.search_path,
                &self.config.save_directory,
                &self.config.chasten_config_path,
            )
            .await?;

        self.enter(PipelineState::RunMutation);
        let mutation = MutationStage::from_config(&self.config)
            .run(&self.config.search_path)
            .await?;

        self.enter(PipelineState::Aggregate);
        let combined = ResultAggregator::combine(analysis, mutation);
        let output_path = self.config.output_path();
        ResultAggregator::persist(&combined, &output_path)?;

        self.enter(PipelineState::Done);
        Ok((output_path, installed_tools))
    }

    /// Returns `true` if the tool had to be installed.
    async fn check_tool(&self, tool: &ExternalTool) -> Result<bool> {
        let installed = self.availability.ensure(tool).await?;
        if installed {
            info!(tool = %tool.name, "Tool installed");
        } else {
            info!(tool = %tool.name, "Tool already available");
        }
        Ok(installed)
    }

    fn enter(&mut self, state: PipelineState) {
        info!(from = %self.state, to = %state, "Pipeline transition");
        self.state = state;
        self.transitions.push(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyzerError;

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::Start.to_string(), "START");
        assert_eq!(PipelineState::CheckAnalysisTool.to_string(), "CHECK_ANALYSIS_TOOL");
        assert_eq!(PipelineState::RunMutation.to_string(), "RUN_MUTATION");
        assert_eq!(PipelineState::Failed.to_string(), "FAILED");
    }

    #[test]
    fn test_state_serde_matches_display() {
        for state in [
            PipelineState::Start,
            PipelineState::CheckMutationTool,
            PipelineState::Aggregate,
            PipelineState::Done,
        ] {
            let value = serde_json::to_value(state).expect("serialize");
            assert_eq!(value, serde_json::Value::String(state.to_string()));
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::RunAnalysis.is_terminal());
    }

    #[test]
    fn test_new_orchestrator_starts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let orchestrator = Orchestrator::new(PipelineConfig::rooted_at(dir.path()));
        assert_eq!(orchestrator.state(), PipelineState::Start);
        assert_eq!(orchestrator.transitions(), &[PipelineState::Start]);
    }

    #[tokio::test]
    async fn test_failed_install_stops_before_stages() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = PipelineConfig::rooted_at(dir.path());
        config.analysis_tool = ExternalTool::custom(
            "chasten",
            vec!["/nonexistent-binary-that-does-not-exist".to_string()],
        );
        config.installer = vec!["false".to_string()];

        let mut orchestrator = Orchestrator::new(config);
        let err = orchestrator.run().await.unwrap_err();

        assert!(matches!(err, AnalyzerError::InstallationFailed { .. }));
        assert_eq!(orchestrator.state(), PipelineState::Failed);
        assert_eq!(
            orchestrator.transitions(),
            &[
                PipelineState::Start,
                PipelineState::CheckAnalysisTool,
                PipelineState::Failed,
            ]
        );
        assert!(!dir.path().join("combined_result.json").exists());
    }
}
