//! Error types for pipeline operations

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Tool '{tool}' is not available")]
    ToolNotAvailable { tool: String },

    #[error("Installation of '{tool}' failed (exit code {exit_code}): {stderr}")]
    InstallationFailed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Command `{command}` failed with exit code {exit_code}:\n{stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Failed to launch '{program}': {source}")]
    CommandLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command `{command}` timed out after {timeout_secs} seconds")]
    CommandTimedOut { command: String, timeout_secs: u64 },

    #[error("Refusing to run an empty command")]
    EmptyCommand,

    #[error("No file matching '{pattern}' found in {}", directory.display())]
    ArtifactNotFound { directory: PathBuf, pattern: String },

    #[error("Invalid artifact pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    #[error("Malformed report from {origin}: {source}")]
    ParseError {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Intermediate file already exists: {}", path.display())]
    FileConflict { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AnalyzerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnalyzerError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, AnalyzerError>;
