//! Version Stamp Module
//!
//! Resolves a short identifier for the checked-out revision and formats it as
//! a `-D` build flag. Resolution never fails: each source is tried in order
//! and the configured sentinel is the last resort.

use crate::runner::{CommandRunner, Invocation};
use std::fmt;
use std::path::Path;

/// Where a resolved version string came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    /// `git describe --always`
    Describe,
    /// `git rev-parse --short HEAD`
    ShortHash,
    Fallback,
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSource::Describe => write!(f, "git describe"),
            VersionSource::ShortHash => write!(f, "abbreviated hash"),
            VersionSource::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub value: String,
    pub source: VersionSource,
}

/// Git queries in preference order
const GIT_QUERIES: [(VersionSource, &[&str]); 2] = [
    (VersionSource::Describe, &["describe", "--always"]),
    (VersionSource::ShortHash, &["rev-parse", "--short", "HEAD"]),
];

/// Resolve the revision of the repository containing `repo_dir`
pub fn resolve_version<R>(runner: &R, git: &str, repo_dir: &Path, fallback: &str) -> ResolvedVersion
where
    R: CommandRunner + ?Sized,
{
    for (source, args) in GIT_QUERIES {
        let invocation = Invocation::new(git, args.iter().copied(), repo_dir);
        if let Some(value) = query(runner, &invocation) {
            tracing::debug!("Resolved version {} from {}", value, source);
            return ResolvedVersion { value, source };
        }
    }

    tracing::warn!(
        "Could not resolve revision in {}, using {}",
        repo_dir.display(),
        fallback
    );
    ResolvedVersion {
        value: fallback.to_string(),
        source: VersionSource::Fallback,
    }
}

/// One attempt; any failure (spawn, exit status, empty output) yields `None`
fn query<R>(runner: &R, invocation: &Invocation) -> Option<String>
where
    R: CommandRunner + ?Sized,
{
    match runner.capture(invocation) {
        Ok(outcome) if outcome.success() => {
            let value = outcome.stdout.trim();
            if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        }
        Ok(outcome) => {
            tracing::debug!("`{}` exited with {:?}", invocation, outcome.code);
            None
        }
        Err(e) => {
            tracing::debug!("`{}` could not run: {}", invocation, e);
            None
        }
    }
}

/// `-D<define>=<version> <extra...>`. The space after the version is always
/// emitted; extras are joined verbatim without quoting.
pub fn format_flag<S: AsRef<str>>(define: &str, version: &str, extra: &[S]) -> String {
    let extra: Vec<&str> = extra.iter().map(AsRef::as_ref).collect();
    format!("-D{}={} {}", define, version, extra.join(" "))
}
