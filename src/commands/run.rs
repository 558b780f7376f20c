use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::App;
use crate::mutator::ShellExecutor;
use crate::orchestrator::Orchestrator;
use crate::report::Report;

impl App {
    /// Run the configured command across every selected repository.
    ///
    /// 1. Resolve the repository set. Any discovery error aborts the run.
    /// 2. Clone, run the command and publish each repository concurrently.
    /// 3. Write one line per repository plus a summary to `stdout`.
    ///
    /// Ctrl-C aborts in-flight repositories; the report still lists every one.
    pub async fn cmd_run(&self, stdout: &mut impl std::io::Write) -> Result<Report> {
        self.config.validate()?;

        let repos = self.resolve_repositories().await?;
        info!(count = repos.len(), "Resolved repositories");

        let executor = Arc::new(ShellExecutor::new(self.config.command_timeout));
        let orchestrator =
            Orchestrator::new(Arc::clone(&self.config), Arc::clone(&self.host), executor);
        let report = orchestrator.run(repos, interrupted()).await;

        report.write(stdout)?;
        Ok(report)
    }
}

/// Resolves on Ctrl-C. Never resolves if the signal handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
