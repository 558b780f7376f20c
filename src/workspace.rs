use std::path::Path;

use tempfile::TempDir;
use tracing::debug;
use tracing::instrument;

use crate::clients::git::BasicAuth;
use crate::clients::git::CommitId;
use crate::clients::git::GitClient;
use crate::config::Config;
use crate::error::WorkspaceError;
use crate::source::RepositoryRef;

/// A local clone of one repository, owned by the task processing it.
///
/// The directory is removed when the workspace is dropped unless the run keeps
/// workspaces.
pub struct Workspace {
    git: GitClient,
    base: CommitId,
    _dir: Option<TempDir>,
}

impl Workspace {
    /// Clone `repo` into a fresh directory under the scratch root.
    ///
    /// The scratch root is created if needed. Every call gets its own directory,
    /// named after the repository, so concurrent workspaces never collide.
    #[instrument(skip_all, fields(repo = %repo.full_name()))]
    pub async fn acquire(repo: &RepositoryRef, config: &Config) -> Result<Self, WorkspaceError> {
        tokio::fs::create_dir_all(&config.scratch_root)
            .await
            .map_err(|source| WorkspaceError::CreateDir {
                path: config.scratch_root.clone(),
                source,
            })?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", repo.name))
            .tempdir_in(&config.scratch_root)
            .map_err(|source| WorkspaceError::CreateDir {
                path: config.scratch_root.join(&repo.name),
                source,
            })?;
        let path = std::path::absolute(dir.path()).map_err(|source| WorkspaceError::CreateDir {
            path: dir.path().to_path_buf(),
            source,
        })?;
        let dir = if config.keep_workspaces {
            let _ = dir.keep();
            None
        } else {
            Some(dir)
        };

        let auth = BasicAuth {
            username: repo.owner.clone(),
            password: config.token.clone(),
        };
        let git = GitClient::new(path)
            .with_auth(Some(auth))
            .with_author(config.author.clone());

        debug!(path = %git.path().display(), "Cloning");
        git.clone_into(&repo.clone_url, &repo.default_branch)
            .await
            .map_err(WorkspaceError::Clone)?;
        let base = git.head().await.map_err(WorkspaceError::Head)?;

        Ok(Self {
            git,
            base,
            _dir: dir,
        })
    }

    pub fn path(&self) -> &Path {
        self.git.path()
    }

    pub fn git(&self) -> &GitClient {
        &self.git
    }

    /// HEAD as cloned, before any command ran.
    pub fn base(&self) -> &CommitId {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    #[tokio::test]
    async fn test_acquire_clones_default_branch() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let remote = test_utils::create_remote(dir.path(), "service").await?;
        let config = Config::default_for_tests(dir.path().join("scratch"));
        let repo = test_utils::local_repo_ref("service", &remote);

        let workspace = Workspace::acquire(&repo, &config).await?;
        let path = workspace.path().to_path_buf();

        assert!(path.starts_with(std::path::absolute(dir.path().join("scratch"))?));
        assert!(
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("service-")
        );
        assert!(path.join("README.md").exists());
        assert_eq!(
            workspace.base().0,
            test_utils::rev_parse(&remote, "refs/heads/main").await?
        );

        drop(workspace);
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_acquire_twice_uses_distinct_directories() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let remote = test_utils::create_remote(dir.path(), "service").await?;
        let config = Config::default_for_tests(dir.path().join("scratch"));
        let repo = test_utils::local_repo_ref("service", &remote);

        let first = Workspace::acquire(&repo, &config).await?;
        let second = Workspace::acquire(&repo, &config).await?;
        assert_ne!(first.path(), second.path());
        Ok(())
    }

    #[tokio::test]
    async fn test_keep_workspaces() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let remote = test_utils::create_remote(dir.path(), "service").await?;
        let mut config = Config::default_for_tests(dir.path().join("scratch"));
        config.keep_workspaces = true;
        let repo = test_utils::local_repo_ref("service", &remote);

        let workspace = Workspace::acquire(&repo, &config).await?;
        let path = workspace.path().to_path_buf();
        drop(workspace);
        assert!(path.join("README.md").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_clone_failure_removes_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let scratch = dir.path().join("scratch");
        let config = Config::default_for_tests(scratch.clone());
        let repo = test_utils::local_repo_ref("ghost", &dir.path().join("ghost.git"));

        let err = Workspace::acquire(&repo, &config).await.err().unwrap();
        assert!(matches!(err, WorkspaceError::Clone(_)));
        assert_eq!(std::fs::read_dir(&scratch)?.count(), 0);
        Ok(())
    }
}
