//! External tool definitions, availability probing and installation.

use crate::error::{AnalyzerError, Result};
use crate::runner::{CommandRunner, CommandSpec};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// An external program the pipeline depends on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalTool {
    /// Package name, as passed to the installer.
    pub name: String,

    /// Invocation prefix (first element is executable).
    pub command: Vec<String>,

    /// Argument that makes the tool print its version and exit 0.
    pub version_arg: String,
}

impl ExternalTool {
    /// The chasten static-analysis tool.
    pub fn chasten() -> Self {
        Self::custom("chasten", vec!["chasten".to_string()])
    }

    /// The mutmut mutation-testing tool.
    pub fn mutmut() -> Self {
        Self::custom("mutmut", vec!["mutmut".to_string()])
    }

    /// A tool with an arbitrary invocation prefix and `--version` probe.
    pub fn custom(name: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command,
            version_arg: "--version".to_string(),
        }
    }

    /// Command line for the version probe.
    pub fn version_command(&self) -> Vec<String> {
        let mut argv = self.command.clone();
        argv.push(self.version_arg.clone());
        argv
    }

    /// Command line for invoking the tool with `args`.
    pub fn invocation<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = self.command.clone();
        argv.extend(args.into_iter().map(Into::into));
        argv
    }
}

/// Probes for and installs external tools.
#[derive(Debug, Clone)]
pub struct ToolAvailability {
    /// Installer prefix; the tool name is appended.
    installer: Vec<String>,
    timeout_secs: u64,
}

impl Default for ToolAvailability {
    fn default() -> Self {
        Self::new(vec!["pipx".to_string(), "install".to_string()])
    }
}

impl ToolAvailability {
    pub fn new(installer: Vec<String>) -> Self {
        Self {
            installer,
            timeout_secs: 0,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Whether the tool answers its version probe with exit status 0.
    ///
    /// Launch failures and non-zero exits both read as "not installed".
    pub async fn is_installed(&self, tool: &ExternalTool) -> bool {
        let spec = CommandSpec::new(tool.version_command()).with_timeout(self.timeout_secs);
        match CommandRunner::run(&spec).await {
            Ok(output) if output.success() => {
                debug!(tool = %tool.name, version = %output.stdout.trim(), "Tool available");
                true
            }
            Ok(output) => {
                debug!(tool = %tool.name, exit_code = output.exit_code, "Version probe failed");
                false
            }
            Err(e) => {
                debug!(tool = %tool.name, error = %e, "Version probe could not run");
                false
            }
        }
    }

    /// Install the tool with the configured installer. Not retried.
    pub async fn install(&self, tool: &ExternalTool) -> Result<()> {
        let mut argv = self.installer.clone();
        argv.push(tool.name.clone());
        let spec = CommandSpec::new(argv).with_timeout(self.timeout_secs);

        info!(tool = %tool.name, installer = %spec.display(), "Installing tool");

        let output = CommandRunner::run(&spec)
            .await
            .map_err(|e| AnalyzerError::InstallationFailed {
                tool: tool.name.clone(),
                exit_code: -1,
                stderr: e.to_string(),
            })?;

        if !output.success() {
            warn!(tool = %tool.name, exit_code = output.exit_code, "Installation failed");
            return Err(AnalyzerError::InstallationFailed {
                tool: tool.name.clone(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(())
    }

    /// Like [`is_installed`](Self::is_installed), but a failed probe is
    /// [`AnalyzerError::ToolNotAvailable`].
    pub async fn check(&self, tool: &ExternalTool) -> Result<()> {
        if self.is_installed(tool).await {
            Ok(())
        } else {
            Err(AnalyzerError::ToolNotAvailable {
                tool: tool.name.clone(),
            })
        }
    }

    /// Install the tool only if the probe fails.
    ///
    /// Returns `true` when an installation took place.
    pub async fn ensure(&self, tool: &ExternalTool) -> Result<bool> {
        match self.check(tool).await {
            Ok(()) => Ok(false),
            Err(missing @ AnalyzerError::ToolNotAvailable { .. }) => {
                info!(tool = %tool.name, reason = %missing, "Installing missing tool");
                self.install(tool).await?;
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }
}
