//! Web Bundle Build Module
//!
//! Runs the package manager's install step and then its build script inside
//! the web UI directory, ahead of the firmware compile:
//! - `TriggerPolicy` decides whether the requested build targets need a bundle
//! - The first failing step stops the sequence
//! - Failures are classified so the caller can print a precise diagnostic

use crate::config::BuildConfig;
use crate::runner::{CommandRunner, Invocation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Build targets that need a fresh web bundle
pub const DEFAULT_TRIGGER_TARGETS: [&str; 4] = ["build", "upload", "program", "uploadfs"];

/// When the web bundle step runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TriggerPolicy {
    /// Run on every invocation
    Always,
    /// Run only when a requested target is in this set
    Targets { targets: Vec<String> },
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        TriggerPolicy::Targets {
            targets: DEFAULT_TRIGGER_TARGETS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl TriggerPolicy {
    pub fn should_run<S: AsRef<str>>(&self, requested: &[S]) -> bool {
        match self {
            TriggerPolicy::Always => true,
            TriggerPolicy::Targets { targets } => requested
                .iter()
                .any(|r| targets.iter().any(|t| t == r.as_ref())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    Install,
    Build,
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStep::Install => write!(f, "dependency install"),
            BuildStep::Build => write!(f, "build script"),
        }
    }
}

#[derive(Debug)]
pub enum WebBuildError {
    /// Executable or web directory could not be located
    NotFound { path: PathBuf, source: io::Error },
    /// Any other failure to start the step (permissions, I/O)
    Os {
        step: BuildStep,
        filename: Option<String>,
        source: io::Error,
    },
    /// Step ran and exited unsuccessfully; `code` is `None` when killed by a signal
    ExitStatus {
        step: BuildStep,
        command: String,
        code: Option<i32>,
    },
}

impl fmt::Display for WebBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebBuildError::NotFound { path, source } => {
                write!(f, "File not found: {}: {}", path.display(), source)
            }
            WebBuildError::Os {
                step,
                filename,
                source,
            } => {
                write!(f, "OS error during {}: {}", step, source)?;
                if let Some(name) = filename {
                    write!(f, " (file: {})", name)?;
                }
                Ok(())
            }
            WebBuildError::ExitStatus {
                command,
                code: Some(code),
                ..
            } => write!(
                f,
                "Command '{}' returned non-zero exit status {}",
                command, code
            ),
            WebBuildError::ExitStatus {
                command,
                code: None,
                ..
            } => write!(f, "Command '{}' terminated by signal", command),
        }
    }
}

impl WebBuildError {
    /// Step that failed, when the failure happened inside one
    pub fn step(&self) -> Option<BuildStep> {
        match self {
            WebBuildError::NotFound { .. } => None,
            WebBuildError::Os { step, .. } | WebBuildError::ExitStatus { step, .. } => Some(*step),
        }
    }
}

impl std::error::Error for WebBuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WebBuildError::NotFound { source, .. } | WebBuildError::Os { source, .. } => {
                Some(source)
            }
            WebBuildError::ExitStatus { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebBuildOutcome {
    /// No requested target needed the bundle
    Skipped,
    Built { steps: Vec<BuildStep> },
}

/// Install-then-build sequence for one web directory
#[derive(Debug, Clone)]
pub struct WebBuild {
    pub web_dir: PathBuf,
    pub package_manager: String,
    pub install_args: Vec<String>,
    pub build_args: Vec<String>,
    pub trigger: TriggerPolicy,
}

impl WebBuild {
    pub fn from_config(config: &BuildConfig, project_root: &Path) -> Self {
        Self {
            web_dir: config.web_dir_in(project_root),
            package_manager: config.package_manager.clone(),
            install_args: config.install_args.clone(),
            build_args: config.build_args.clone(),
            trigger: config.trigger.clone(),
        }
    }

    fn invocation(&self, step: BuildStep) -> Invocation {
        let args = match step {
            BuildStep::Install => &self.install_args,
            BuildStep::Build => &self.build_args,
        };
        Invocation::new(&self.package_manager, args.iter().cloned(), &self.web_dir)
    }

    /// Run the bundle build if the requested targets call for it
    pub fn run<R, S>(
        &self,
        runner: &R,
        requested_targets: &[S],
    ) -> Result<WebBuildOutcome, WebBuildError>
    where
        R: CommandRunner + ?Sized,
        S: AsRef<str>,
    {
        if !self.trigger.should_run(requested_targets) {
            tracing::info!("No bundle-producing target requested, skipping web build");
            return Ok(WebBuildOutcome::Skipped);
        }

        if !self.web_dir.is_dir() {
            return Err(WebBuildError::NotFound {
                path: self.web_dir.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "web directory does not exist"),
            });
        }

        let mut steps = Vec::new();
        for step in [BuildStep::Install, BuildStep::Build] {
            self.run_step(runner, step)?;
            steps.push(step);
        }

        Ok(WebBuildOutcome::Built { steps })
    }

    fn run_step<R>(&self, runner: &R, step: BuildStep) -> Result<(), WebBuildError>
    where
        R: CommandRunner + ?Sized,
    {
        let invocation = self.invocation(step);
        tracing::info!("Running {}: {}", step, invocation);
        let started = Instant::now();

        let outcome = runner
            .status(&invocation)
            .map_err(|source| classify_spawn_error(step, &invocation, source))?;

        if !outcome.success() {
            return Err(WebBuildError::ExitStatus {
                step,
                command: invocation.to_string(),
                code: outcome.code,
            });
        }

        tracing::info!("{} finished in {:.1?}", step, started.elapsed());
        Ok(())
    }
}

fn classify_spawn_error(step: BuildStep, invocation: &Invocation, source: io::Error) -> WebBuildError {
    match source.kind() {
        io::ErrorKind::NotFound => WebBuildError::NotFound {
            path: PathBuf::from(&invocation.program),
            source,
        },
        _ => WebBuildError::Os {
            step,
            filename: Some(invocation.program.clone()),
            source,
        },
    }
}
