use anyhow::Result;
use colored::Colorize;

use crate::App;

impl App {
    /// Print the repositories the current selection resolves to, without cloning them.
    pub async fn cmd_list(&self, stdout: &mut impl std::io::Write) -> Result<()> {
        let repos = self.resolve_repositories().await?;

        for repo in &repos {
            let mut flags = Vec::new();
            if repo.archived {
                flags.push("archived");
            }
            if repo.fork {
                flags.push("fork");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };

            writeln!(
                stdout,
                "{} {} {}{}",
                repo.full_name().cyan(),
                repo.default_branch,
                repo.clone_url.dimmed(),
                flags.yellow()
            )?;
        }
        writeln!(stdout, "{} repositories", repos.len())?;

        Ok(())
    }
}
