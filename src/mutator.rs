//! Run the user command against a workspace.

use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::debug;
use tracing::instrument;
use walkdir::WalkDir;

use crate::error::ExecutionError;

const GIT_DIR: &str = ".git";

// -----------------------------------------------------------------------------
// Executor trait

/// Runs a shell expression in a directory.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, dir: &Path, command: &str) -> Result<(), ExecutionError>;
}

// -----------------------------------------------------------------------------
// ShellExecutor

/// Executes commands with `/bin/sh -c`, optionally bounded by a timeout.
pub struct ShellExecutor {
    shell: PathBuf,
    timeout: Option<Duration>,
}

impl ShellExecutor {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            shell: PathBuf::from("/bin/sh"),
            timeout,
        }
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    async fn execute(&self, dir: &Path, command: &str) -> Result<(), ExecutionError> {
        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .current_dir(dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout {
            Some(after) => tokio::time::timeout(after, child)
                .await
                .map_err(|_| ExecutionError::Timeout {
                    dir: dir.to_path_buf(),
                    after,
                })?,
            None => child.await,
        }
        .map_err(|source| ExecutionError::Spawn {
            dir: dir.to_path_buf(),
            source,
        })?;

        if !output.stdout.is_empty() {
            debug!(dir = %dir.display(), stdout = %String::from_utf8_lossy(&output.stdout).trim_end());
        }

        if !output.status.success() {
            return Err(ExecutionError::CommandFailed {
                dir: dir.to_path_buf(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Mutation

/// Run `command` against the working copy at `root`.
///
/// Without `loop_dir` the command runs once in `root`. With it, the command runs in
/// `root` and then in every directory below it, depth first in file-name order.
/// Each invocation finishes before the next starts and the first failure stops
/// the walk.
///
/// Unlike a plain directory walk, loop mode never enters `.git` (nor anything
/// below it), so the command cannot touch repository metadata.
///
/// Returns the number of invocations.
#[instrument(skip_all, fields(root = %root.display(), loop_dir = loop_dir))]
pub async fn mutate(
    executor: &dyn Executor,
    root: &Path,
    command: &str,
    loop_dir: bool,
) -> Result<usize, ExecutionError> {
    if command.trim().is_empty() {
        return Err(ExecutionError::NoCommand);
    }

    if !loop_dir {
        executor.execute(root, command).await?;
        return Ok(1);
    }

    let mut invocations = 0;
    let walk = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || entry.file_name() != GIT_DIR);

    for entry in walk {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        executor.execute(entry.path(), command).await?;
        invocations += 1;
    }

    debug!(invocations, "Ran command in every directory");
    Ok(invocations)
}
