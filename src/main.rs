use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use git_xargs::App;
use git_xargs::Config;
use git_xargs::clients::github::GithubClient;
use git_xargs::config::Author;
use git_xargs::config::DEFAULT_API_BASE;
use git_xargs::config::DEFAULT_BRANCH;
use git_xargs::config::DEFAULT_COMMIT_MESSAGE;
use git_xargs::config::DEFAULT_CONCURRENCY;
use git_xargs::config::DEFAULT_SCRATCH_ROOT;
use git_xargs::config::RepoFilters;
use git_xargs::config::Selection;
use git_xargs::config::Token;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::Layer as _;

#[derive(Parser)]
#[command(name = "git-xargs")]
#[command(about = "Run a command across many GitHub repositories and open a pull request for each change", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command in every selected repository and open pull requests
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Shell command to run in each repository
        #[arg(short, long)]
        command: String,

        /// Commit message, also used as the pull request title
        #[arg(short = 'm', long = "commit", default_value = DEFAULT_COMMIT_MESSAGE)]
        commit_message: String,

        /// Run the command but never commit, push or open pull requests
        #[arg(short, long)]
        skip_commit: bool,

        /// Run the command in every directory of each repository
        #[arg(short, long)]
        loop_dir: bool,

        /// Branch to push changes to
        #[arg(long, default_value = DEFAULT_BRANCH)]
        branch: String,

        /// Maximum number of repositories processed at once
        #[arg(short = 'j', long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Kill the command after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Directory in which repositories are cloned
        #[arg(long, default_value = DEFAULT_SCRATCH_ROOT)]
        scratch_dir: PathBuf,

        /// Leave cloned repositories on disk after the run
        #[arg(long)]
        keep_workspaces: bool,

        /// Open pull requests as drafts
        #[arg(long)]
        draft: bool,

        /// Commit author name (requires --author-email)
        #[arg(long, requires = "author_email")]
        author_name: Option<String>,

        /// Commit author email (requires --author-name)
        #[arg(long, requires = "author_name")]
        author_email: Option<String>,
    },
    /// List the repositories a selection resolves to
    List {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args)]
pub struct TargetArgs {
    /// GitHub organisation owning the repositories
    #[arg(short, long)]
    organisation: String,

    /// Select repositories whose name contains this substring (empty selects all)
    #[arg(short, long)]
    repository: Option<String>,

    /// Select repositories listed one per line in this file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Skip archived repositories
    #[arg(long)]
    exclude_archived: bool,

    /// Skip forked repositories
    #[arg(long)]
    exclude_forks: bool,

    /// GitHub API base URL
    #[arg(long, default_value = DEFAULT_API_BASE)]
    api_base: String,
}

impl TargetArgs {
    fn into_config(self) -> Result<Config> {
        let selection = Selection::from_flags(self.repository, self.file)?;
        let token = Token::from_env()?;
        let mut config = Config::new(self.organisation, selection, token);
        config.filters = RepoFilters {
            exclude_archived: self.exclude_archived,
            exclude_forks: self.exclude_forks,
        };
        config.api_base = self.api_base;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    setup_logging()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            target,
            command,
            commit_message,
            skip_commit,
            loop_dir,
            branch,
            concurrency,
            timeout,
            scratch_dir,
            keep_workspaces,
            draft,
            author_name,
            author_email,
        } => {
            let mut config = target.into_config()?;
            config.command = command;
            config.commit_message = commit_message;
            config.skip_commit = skip_commit;
            config.loop_dir = loop_dir;
            config.branch = branch;
            config.concurrency = concurrency;
            config.command_timeout = timeout.map(Duration::from_secs);
            config.scratch_root = scratch_dir;
            config.keep_workspaces = keep_workspaces;
            config.draft = draft;
            config.author = author_name
                .zip(author_email)
                .map(|(name, email)| Author { name, email });
            config.validate()?;

            let app = app(config);
            let report = app.cmd_run(&mut std::io::stdout()).await?;
            if report.has_failures() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::List { target } => {
            let app = app(target.into_config()?);
            app.cmd_list(&mut std::io::stdout()).await?
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn app(config: Config) -> App {
    let host = GithubClient::new(config.token.clone(), config.api_base.clone());
    App::new(config, Arc::new(host))
}

fn setup_logging() -> Result<()> {
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let format = tracing_subscriber::fmt::format().with_timer(timer);
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;
    let subscriber = tracing_subscriber::fmt::layer()
        .event_format(format)
        .with_writer(std::io::stderr)
        .with_filter(filter);
    tracing_subscriber::registry().with(subscriber).init();
    Ok(())
}
