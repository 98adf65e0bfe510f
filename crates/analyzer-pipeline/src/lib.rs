//! Analyzer Pipeline - static analysis and mutation testing in one report
//!
//! Provides a pipeline orchestrator that:
//! - Verifies that `chasten` and `mutmut` are callable, installing them if not
//! - Runs `chasten analyze` and collects the JSON report it saves
//! - Runs `mutmut` in the target project and converts its JUnit XML report
//! - Merges both reports into a single `combined_result.json`

pub mod aggregate;
pub mod analysis;
pub mod artifact;
pub mod config;
pub mod error;
pub mod mutation;
pub mod pipeline;
pub mod runner;
pub mod telemetry;
pub mod tool;

// Re-export key types
pub use aggregate::{CombinedResult, ResultAggregator};
pub use analysis::AnalysisStage;
pub use artifact::{ArtifactLocator, ArtifactSnapshot};
pub use config::PipelineConfig;
pub use error::{AnalyzerError, Result};
pub use mutation::{MutationStage, WorkingDirectoryScope};
pub use pipeline::{Orchestrator, PipelineOutcome, PipelineState};
pub use runner::{CommandOutput, CommandRunner, CommandSpec};
pub use tool::{ExternalTool, ToolAvailability};
