//! Fan the per-repository pipeline out across a batch of repositories.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument as _;
use tracing::error;
use tracing::info;
use tracing::info_span;
use tracing::warn;

use crate::clients::github::RepoHost;
use crate::config::Config;
use crate::error::PipelineError;
use crate::mutator;
use crate::mutator::Executor;
use crate::publish::ChangePublisher;
use crate::report::Outcome;
use crate::report::Report;
use crate::report::RunResult;
use crate::source::RepositoryRef;
use crate::workspace::Workspace;

/// Runs clone, command and publish for each repository on a bounded pool of tasks.
pub struct Orchestrator {
    config: Arc<Config>,
    host: Arc<dyn RepoHost>,
    executor: Arc<dyn Executor>,
}

impl Orchestrator {
    pub fn new(config: Arc<Config>, host: Arc<dyn RepoHost>, executor: Arc<dyn Executor>) -> Self {
        Self {
            config,
            host,
            executor,
        }
    }

    /// Process every repository and report one result per input, in input order.
    ///
    /// At most `config.concurrency` repositories are in flight at once. A failure
    /// is recorded against its repository and never affects the others. If `cancel`
    /// completes first, in-flight tasks are aborted (killing their child processes)
    /// and every unfinished repository is reported as cancelled.
    pub async fn run(
        &self,
        repos: Vec<RepositoryRef>,
        cancel: impl Future<Output = ()>,
    ) -> Report {
        let permits = self.config.concurrency.clamp(1, Semaphore::MAX_PERMITS);
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut tasks = JoinSet::new();

        for (index, repo) in repos.iter().cloned().enumerate() {
            let config = Arc::clone(&self.config);
            let host = Arc::clone(&self.host);
            let executor = Arc::clone(&self.executor);
            let semaphore = Arc::clone(&semaphore);
            let span = info_span!("repository", repo = %repo.full_name());

            tasks.spawn(
                async move {
                    // The semaphore is never closed
                    let _permit = semaphore.acquire_owned().await.ok();
                    let outcome =
                        match process(&config, host.as_ref(), executor.as_ref(), &repo).await {
                            Ok(outcome) => outcome,
                            Err(err) => {
                                error!(error = %err, "Repository failed");
                                Outcome::Failed(err)
                            }
                        };
                    (index, outcome)
                }
                .instrument(span),
            );
        }

        let mut outcomes: Vec<Option<Outcome>> = repos.iter().map(|_| None).collect();
        let mut cancelled = false;
        let mut cancel = std::pin::pin!(cancel);

        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok((index, outcome))) => outcomes[index] = Some(outcome),
                    Some(Err(err)) => error!(error = %err, "Repository task did not complete"),
                    None => break,
                },
                () = &mut cancel => {
                    warn!(remaining = tasks.len(), "Cancelling in-flight repositories");
                    cancelled = true;
                    tasks.abort_all();
                    while let Some(joined) = tasks.join_next().await {
                        if let Ok((index, outcome)) = joined {
                            outcomes[index] = Some(outcome);
                        }
                    }
                    break;
                }
            }
        }

        let results = repos
            .iter()
            .zip(outcomes)
            .map(|(repo, outcome)| RunResult {
                repository: repo.full_name(),
                outcome: outcome.unwrap_or(Outcome::Failed(if cancelled {
                    PipelineError::Cancelled
                } else {
                    PipelineError::Panicked
                })),
            })
            .collect();

        let report = Report { results };
        info!(
            published = report.published(),
            unchanged = report.unchanged(),
            failed = report.failed(),
            "Run complete"
        );
        report
    }
}

/// Clone, run the command, then publish. The workspace is released on return.
async fn process(
    config: &Config,
    host: &dyn RepoHost,
    executor: &dyn Executor,
    repo: &RepositoryRef,
) -> Result<Outcome, PipelineError> {
    let workspace = Workspace::acquire(repo, config).await?;

    mutator::mutate(executor, workspace.path(), &config.command, config.loop_dir).await?;

    if config.skip_commit {
        info!("Skipping commit");
        return Ok(Outcome::NoChanges);
    }

    let publisher = ChangePublisher {
        host,
        branch: &config.branch,
        message: &config.commit_message,
        draft: config.draft,
    };
    Ok(publisher
        .publish(&workspace, workspace.base(), repo)
        .await?)
}
