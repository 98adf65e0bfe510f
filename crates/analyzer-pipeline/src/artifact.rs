//! Discovery of report files written by external tools.
//!
//! Tools such as `chasten analyze --save` name their report themselves, so the
//! pipeline finds it afterwards by picking the newest file matching a pattern.
//! Two runs writing into the same directory at once can race here; that is not
//! supported.

use crate::error::{AnalyzerError, Result};
use glob::{MatchOptions, Pattern};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Finds the most recently created file matching a glob pattern.
#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    directory: PathBuf,
    pattern: String,
    exclude: Vec<PathBuf>,
    baseline: Option<ArtifactSnapshot>,
}

/// Matching files and their modification times at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSnapshot {
    files: HashMap<PathBuf, SystemTime>,
}

impl ArtifactSnapshot {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Whether `path` was present with this modification time.
    fn unchanged(&self, path: &Path, modified: SystemTime) -> bool {
        self.files.get(path) == Some(&modified)
    }
}

/// A matching file as seen on disk.
struct Candidate {
    path: PathBuf,
    created: SystemTime,
    modified: SystemTime,
}

fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    }
}

impl ArtifactLocator {
    pub fn new(directory: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            pattern: pattern.into(),
            exclude: Vec::new(),
            baseline: None,
        }
    }

    /// Never return `path`, even if it matches.
    pub fn excluding(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclude.push(path.into());
        self
    }

    /// Only consider files created or rewritten after `snapshot` was taken.
    pub fn changed_since(mut self, snapshot: ArtifactSnapshot) -> Self {
        self.baseline = Some(snapshot);
        self
    }

    /// Record the matching files present right now.
    ///
    /// A directory that does not exist yet gives an empty snapshot.
    pub fn snapshot(&self) -> Result<ArtifactSnapshot> {
        let candidates = match self.scan() {
            Ok(candidates) => candidates,
            Err(AnalyzerError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        Ok(ArtifactSnapshot {
            files: candidates
                .into_iter()
                .map(|c| (c.path, c.modified))
                .collect(),
        })
    }

    /// Path of the newest matching file.
    ///
    /// Files are compared by creation time, or modification time where the
    /// filesystem does not record creation. Equal timestamps go to the
    /// greatest file name.
    pub fn latest(&self) -> Result<PathBuf> {
        let mut candidates = Vec::new();
        for candidate in self.scan()? {
            if self.is_excluded(&candidate.path) {
                debug!(path = %candidate.path.display(), "Ignoring excluded artifact candidate");
                continue;
            }
            if let Some(baseline) = &self.baseline {
                if baseline.unchanged(&candidate.path, candidate.modified) {
                    debug!(path = %candidate.path.display(), "Ignoring pre-existing file");
                    continue;
                }
            }
            candidates.push((candidate.path, candidate.created));
        }

        debug!(
            directory = %self.directory.display(),
            pattern = %self.pattern,
            candidates = candidates.len(),
            "Scanned for artifacts"
        );

        select_latest(candidates).ok_or_else(|| AnalyzerError::ArtifactNotFound {
            directory: self.directory.clone(),
            pattern: self.pattern.clone(),
        })
    }

    /// Regular files in the directory whose names match the pattern.
    fn scan(&self) -> Result<Vec<Candidate>> {
        let pattern = Pattern::new(&self.pattern)?;
        let options = match_options();

        let entries =
            fs::read_dir(&self.directory).map_err(|e| AnalyzerError::io(&self.directory, e))?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| AnalyzerError::io(&self.directory, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !pattern.matches_with(name, options) {
                continue;
            }

            let path = entry.path();
            let metadata = entry.metadata().map_err(|e| AnalyzerError::io(&path, e))?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata
                .modified()
                .map_err(|e| AnalyzerError::io(&path, e))?;
            let created = metadata.created().unwrap_or(modified);
            candidates.push(Candidate {
                path,
                created,
                modified,
            });
        }
        Ok(candidates)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.exclude.iter().any(|excluded| {
            excluded == path
                || matches!(
                    (excluded.canonicalize(), path.canonicalize()),
                    (Ok(a), Ok(b)) if a == b
                )
        })
    }
}

/// Find the newest file matching `pattern` in `directory`.
pub fn latest_matching(directory: impl Into<PathBuf>, pattern: &str) -> Result<PathBuf> {
    ArtifactLocator::new(directory, pattern).latest()
}

fn select_latest(candidates: Vec<(PathBuf, SystemTime)>) -> Option<PathBuf> {
    candidates
        .into_iter()
        .max_by(|(a_path, a_time), (b_path, b_time)| {
            a_time
                .cmp(b_time)
                .then_with(|| a_path.file_name().cmp(&b_path.file_name()))
        })
        .map(|(path, _)| path)
}
