//! Analyzer CLI
//!
//! The `analyzer` command runs chasten and mutmut against a project and stores
//! both reports in a single `combined_result.json`.

use analyzer_pipeline::config::DEFAULT_OUTPUT_FILE;
use analyzer_pipeline::telemetry::{init_tracing, level_for};
use analyzer_pipeline::{Orchestrator, PipelineConfig};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "analyzer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run chasten and mutmut and combine their results", long_about = None)]
struct Cli {
    /// Project to analyze (default: ./demo/lazytracker)
    #[arg(long, env = "ANALYZER_SEARCH_PATH")]
    search_path: Option<PathBuf>,

    /// Directory for chasten's report and the combined result (default: current directory)
    #[arg(long, env = "ANALYZER_SAVE_DIRECTORY")]
    save_directory: Option<PathBuf>,

    /// chasten configuration directory (default: ./Config)
    #[arg(long, env = "ANALYZER_CHASTEN_CONFIG_PATH")]
    chasten_config_path: Option<PathBuf>,

    /// File name of the combined result inside the save directory
    #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
    output_file_name: String,

    /// Kill any external command running longer than this (0 = never)
    #[arg(long, default_value_t = 0)]
    timeout_secs: u64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Overlay the command-line options on `base`.
    fn into_config(self, mut base: PipelineConfig) -> PipelineConfig {
        if let Some(search_path) = self.search_path {
            base.search_path = search_path;
        }
        if let Some(save_directory) = self.save_directory {
            base.save_directory = save_directory;
        }
        if let Some(chasten_config_path) = self.chasten_config_path {
            base.chasten_config_path = chasten_config_path;
        }
        base.output_file_name = self.output_file_name;
        base.command_timeout_secs = self.timeout_secs;
        base
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json, level_for(cli.verbose));

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let config = cli.into_config(PipelineConfig::rooted_at(&cwd));
    debug!(?config, "Resolved configuration");

    let output_file_name = config.output_file_name.clone();
    let outcome = Orchestrator::new(config)
        .run()
        .await
        .context("Analysis pipeline failed")?;
    debug!(run_id = %outcome.run_id, duration_ms = outcome.duration_ms, "Run finished");

    println!("\n\nCode analysis and mutation complete!");
    println!("Result is stored in file name {}", output_file_name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::path::Path;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_keep_base_config() {
        let cli = Cli::try_parse_from(["analyzer"]).expect("parse");
        let config = cli.into_config(PipelineConfig::rooted_at(Path::new("/work")));

        assert_eq!(config, PipelineConfig::rooted_at(Path::new("/work")));
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let save = dir.path().display().to_string();
        let cli = Cli::try_parse_from([
            "analyzer",
            "--search-path",
            "/src/primality",
            "--save-directory",
            save.as_str(),
            "--chasten-config-path",
            "/etc/chasten",
            "--output-file-name",
            "report.json",
            "--timeout-secs",
            "900",
            "--verbose",
        ])
        .expect("parse");
        assert!(cli.verbose);
        assert!(!cli.json);

        let config = cli.into_config(PipelineConfig::rooted_at(Path::new("/work")));
        assert_eq!(config.search_path, PathBuf::from("/src/primality"));
        assert_eq!(config.save_directory, dir.path());
        assert_eq!(config.chasten_config_path, PathBuf::from("/etc/chasten"));
        assert_eq!(config.output_path(), dir.path().join("report.json"));
        assert_eq!(config.command_timeout_secs, 900);
    }
}
