//! Error types for each stage of a run.
//!
//! Configuration and discovery errors abort the whole run. Everything under
//! [`PipelineError`] is scoped to a single repository and ends up in that
//! repository's entry of the batch report.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Invalid or incomplete run configuration. Raised before any repository is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("you must set the {0} environment variable")]
    MissingToken(&'static str),

    #[error("no command given")]
    NoCommand,

    #[error("cannot select repositories by both name pattern and list file")]
    ConflictingSelection,

    #[error("select repositories with either a name pattern or a list file")]
    NoSelection,

    #[error("concurrency must be at least 1")]
    InvalidConcurrency,
}

/// Failure to resolve the set of repositories to act on.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to list repositories for {org}")]
    Listing {
        org: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to look up repository {owner}/{name}")]
    Lookup {
        owner: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("repository {owner}/{name} not found (line {line})")]
    NotFound {
        owner: String,
        name: String,
        line: usize,
    },

    #[error("failed to read repository list {}", path.display())]
    ReadList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to produce a local working copy.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("clone failed: {0:#}")]
    Clone(#[source] anyhow::Error),

    #[error("failed to read HEAD: {0:#}")]
    Head(#[source] anyhow::Error),
}

/// Failure while running the user command.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("no command executed")]
    NoCommand,

    #[error("command exited with {} in {}: {stderr}", ExitStatusDisplay(*code), dir.display())]
    CommandFailed {
        dir: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    #[error("command timed out after {}s in {}", after.as_secs(), dir.display())]
    Timeout { dir: PathBuf, after: Duration },

    #[error("failed to spawn command in {}", dir.display())]
    Spawn {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk directories: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Failure while committing, pushing or opening the pull request.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("branch {0} already exists on the remote")]
    BranchExists(String),

    #[error("git {step} failed: {source:#}")]
    Git {
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to open pull request: {0:#}")]
    PullRequest(#[source] anyhow::Error),
}

/// Stage of the per-repository pipeline an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Clone,
    Execute,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Clone => "clone",
            Stage::Execute => "execute",
            Stage::Publish => "publish",
        })
    }
}

/// Any error that ends one repository's pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("cancelled before completion")]
    Cancelled,

    #[error("task panicked")]
    Panicked,
}

impl PipelineError {
    /// The stage the pipeline was in when it stopped, if it was stopped by a stage.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Workspace(_) => Some(Stage::Clone),
            PipelineError::Execution(_) => Some(Stage::Execute),
            PipelineError::Publish(_) => Some(Stage::Publish),
            PipelineError::Cancelled | PipelineError::Panicked => None,
        }
    }
}

struct ExitStatusDisplay(Option<i32>);

impl fmt::Display for ExitStatusDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, "status {code}"),
            None => f.write_str("a signal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_of_each_pipeline_error() {
        let err: PipelineError = ExecutionError::NoCommand.into();
        assert_eq!(err.stage(), Some(Stage::Execute));

        let err: PipelineError = PublishError::BranchExists("update".to_string()).into();
        assert_eq!(err.stage(), Some(Stage::Publish));

        let err: PipelineError = WorkspaceError::Clone(anyhow::anyhow!("boom")).into();
        assert_eq!(err.stage(), Some(Stage::Clone));

        assert_eq!(PipelineError::Cancelled.stage(), None);
    }

    #[test]
    fn test_command_failed_message() {
        let err = ExecutionError::CommandFailed {
            dir: PathBuf::from("/tmp/repo"),
            code: Some(127),
            stderr: "sh: nope: not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "command exited with status 127 in /tmp/repo: sh: nope: not found"
        );

        let err = ExecutionError::CommandFailed {
            dir: PathBuf::from("/tmp/repo"),
            code: None,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "command exited with a signal in /tmp/repo: ");
    }
}
