//! Pipeline run configuration.

use crate::tool::ExternalTool;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default name of the merged report.
pub const DEFAULT_OUTPUT_FILE: &str = "combined_result.json";

/// Everything a single pipeline run needs to know.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Project to analyze and mutate.
    pub search_path: PathBuf,

    /// Where chasten saves its report and the merged result is written.
    pub save_directory: PathBuf,

    /// chasten configuration directory.
    pub chasten_config_path: PathBuf,

    /// Project name passed to `chasten analyze`.
    pub project_name: String,

    /// File name of the merged report inside `save_directory`.
    pub output_file_name: String,

    /// Glob matched against file names in `save_directory` to find chasten's report.
    pub artifact_pattern: String,

    pub analysis_tool: ExternalTool,
    pub mutation_tool: ExternalTool,

    /// JUnit XML to JSON converter; the report path is appended.
    pub converter: Vec<String>,

    /// Package installer; the tool name is appended.
    pub installer: Vec<String>,

    /// Fixed scratch path for mutmut's XML report, relative to `search_path`.
    /// `None` uses a fresh temporary file per run.
    pub mutation_report_path: Option<PathBuf>,

    /// Per-command timeout in seconds (0 = none).
    pub command_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::rooted_at(&cwd)
    }
}

impl PipelineConfig {
    /// Default configuration with every path resolved against `root`.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            search_path: root.join("demo").join("lazytracker"),
            save_directory: root.to_path_buf(),
            chasten_config_path: root.join("Config"),
            project_name: "lazytracker".to_string(),
            output_file_name: DEFAULT_OUTPUT_FILE.to_string(),
            artifact_pattern: "*.json".to_string(),
            analysis_tool: ExternalTool::chasten(),
            mutation_tool: ExternalTool::mutmut(),
            converter: vec!["npx".to_string(), "junit2json".to_string()],
            installer: vec!["pipx".to_string(), "install".to_string()],
            mutation_report_path: None,
            command_timeout_secs: 0,
        }
    }

    /// Full path of the merged report.
    pub fn output_path(&self) -> PathBuf {
        self.save_directory.join(&self.output_file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rooted_defaults() {
        let config = PipelineConfig::rooted_at(Path::new("/work"));
        assert_eq!(config.search_path, PathBuf::from("/work/demo/lazytracker"));
        assert_eq!(config.save_directory, PathBuf::from("/work"));
        assert_eq!(config.chasten_config_path, PathBuf::from("/work/Config"));
        assert_eq!(config.output_path(), PathBuf::from("/work/combined_result.json"));
        assert_eq!(config.analysis_tool.name, "chasten");
        assert_eq!(config.mutation_tool.name, "mutmut");
        assert!(config.mutation_report_path.is_none());
        assert_eq!(config.command_timeout_secs, 0);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: PipelineConfig = serde_json::from_value(serde_json::json!({
            "project_name": "primality",
            "command_timeout_secs": 600,
        }))
        .expect("deserialize");

        assert_eq!(config.project_name, "primality");
        assert_eq!(config.command_timeout_secs, 600);
        assert_eq!(config.output_file_name, DEFAULT_OUTPUT_FILE);
        assert_eq!(config.installer, vec!["pipx".to_string(), "install".to_string()]);
    }
}
