//! Merging both stage reports into the persisted combined result.

use crate::analysis::AnalysisResult;
use crate::error::{AnalyzerError, Result};
use crate::mutation::MutationResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// The merged document. Both reports are carried untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedResult {
    pub chasten_result: AnalysisResult,
    pub mutmut_result: MutationResult,
}

pub struct ResultAggregator;

impl ResultAggregator {
    pub fn combine(analysis: AnalysisResult, mutation: MutationResult) -> CombinedResult {
        CombinedResult {
            chasten_result: analysis,
            mutmut_result: mutation,
        }
    }

    /// Write `result` to `path` as 2-space indented JSON, replacing any existing file.
    pub fn persist(result: &CombinedResult, path: &Path) -> Result<()> {
        let rendered = serde_json::to_string_pretty(result)?;
        fs::write(path, rendered).map_err(|e| AnalyzerError::io(path, e))?;
        info!(path = %path.display(), "Combined result written");
        Ok(())
    }
}
