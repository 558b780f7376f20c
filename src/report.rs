use std::io::Write;

use colored::Colorize;

use crate::error::PipelineError;

/// How one repository's pipeline ended.
#[derive(Debug)]
pub enum Outcome {
    /// A pull request was opened.
    Published { pr_url: String },
    /// Nothing to publish: the tree was clean, or publishing was skipped.
    NoChanges,
    Failed(PipelineError),
}

/// Terminal result for one repository.
#[derive(Debug)]
pub struct RunResult {
    pub repository: String,
    pub outcome: Outcome,
}

/// Results for a whole run, one per input repository, in input order.
#[derive(Debug, Default)]
pub struct Report {
    pub results: Vec<RunResult>,
}

impl Report {
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn published(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Published { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::NoChanges))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Failed(_)))
    }

    fn count(&self, predicate: impl Fn(&Outcome) -> bool) -> usize {
        self.results
            .iter()
            .filter(|result| predicate(&result.outcome))
            .count()
    }

    /// Write one line per repository followed by a summary.
    pub fn write(&self, out: &mut impl Write) -> std::io::Result<()> {
        for result in &self.results {
            let line = match &result.outcome {
                Outcome::Published { pr_url } => {
                    format!("{} {} {}", "✓".green(), result.repository, pr_url.dimmed())
                }
                Outcome::NoChanges => {
                    format!("{} {} {}", "-".yellow(), result.repository, "no changes".dimmed())
                }
                Outcome::Failed(err) => {
                    let reason = match err.stage() {
                        Some(stage) => format!("{stage}: {err}"),
                        None => err.to_string(),
                    };
                    format!("{} {} {}", "✗".red(), result.repository, reason.red())
                }
            };
            writeln!(out, "{}", line)?;
        }

        writeln!(
            out,
            "{} repositories: {} published, {} unchanged, {} failed",
            self.results.len(),
            self.published(),
            self.unchanged(),
            self.failed()
        )
    }
}
