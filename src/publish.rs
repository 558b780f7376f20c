use tracing::info;
use tracing::instrument;

use crate::clients::git::CommitId;
use crate::clients::github::NewPullRequest;
use crate::clients::github::RepoHost;
use crate::error::PublishError;
use crate::report::Outcome;
use crate::source::RepositoryRef;
use crate::workspace::Workspace;

/// Commits, pushes and opens a pull request for whatever a command changed.
pub struct ChangePublisher<'a> {
    pub host: &'a dyn RepoHost,
    pub branch: &'a str,
    pub message: &'a str,
    pub draft: bool,
}

impl ChangePublisher<'_> {
    /// Publish the changes in `workspace` as a pull request against the default branch.
    ///
    /// 1. Create and check out the branch at `base`.
    /// 2. Return [`Outcome::NoChanges`] if the working tree is clean.
    /// 3. Refuse to continue if the branch already exists on the remote.
    /// 4. Stage untracked files and commit everything in one commit.
    /// 5. Push the branch to `origin`.
    /// 6. Open the pull request, titled with the commit message.
    ///
    /// A clean tree is never an error, even when the branch exists from an earlier
    /// run. Never returns [`Outcome::Failed`]; failures come back as [`PublishError`].
    #[instrument(skip_all, fields(repo = %repo.full_name(), branch = %self.branch))]
    pub async fn publish(
        &self,
        workspace: &Workspace,
        base: &CommitId,
        repo: &RepositoryRef,
    ) -> Result<Outcome, PublishError> {
        let git = workspace.git();

        git.create_branch(self.branch, base)
            .await
            .map_err(|source| PublishError::Git {
                step: "checkout",
                source,
            })?;

        let changes = git.status().await.map_err(|source| PublishError::Git {
            step: "status",
            source,
        })?;
        if changes.is_clean() {
            info!("No changes to commit");
            return Ok(Outcome::NoChanges);
        }

        let exists = git
            .remote_branch_exists(self.branch)
            .await
            .map_err(|source| PublishError::Git {
                step: "ls-remote",
                source,
            })?;
        if exists {
            return Err(PublishError::BranchExists(self.branch.to_string()));
        }

        let untracked: Vec<_> = changes.untracked().collect();
        if !untracked.is_empty() {
            git.add(&untracked)
                .await
                .map_err(|source| PublishError::Git { step: "add", source })?;
        }

        let commit = git
            .commit_all(self.message)
            .await
            .map_err(|source| PublishError::Git {
                step: "commit",
                source,
            })?;
        info!(%commit, files = changes.len(), "Committed changes");

        git.push_branch(self.branch)
            .await
            .map_err(|source| PublishError::Git {
                step: "push",
                source,
            })?;

        let request = NewPullRequest {
            title: self.message.to_string(),
            head: self.branch.to_string(),
            base: repo.default_branch.clone(),
            body: String::new(),
            draft: self.draft,
        };
        let pr_url = self
            .host
            .create_pull_request(repo, &request)
            .await
            .map_err(PublishError::PullRequest)?;
        info!(%pr_url, "Opened pull request");

        Ok(Outcome::Published { pr_url })
    }
}
