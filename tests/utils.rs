//! Git fixtures shared by the unit tests (via `src/test_utils.rs`) and the
//! integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer as _;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

async fn git<I, S>(dir: &Path, args: I) -> anyhow::Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .await?;
    anyhow::ensure!(
        output.status.success(),
        "git failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(String::from_utf8(output.stdout)?.trim().to_string())
}

/// Creates `<dir>/<name>.git`, a bare repository whose `main` branch holds:
///
/// ```text
/// README.md
/// src/lib.txt
/// src/nested/mod.txt
/// ```
pub async fn create_remote(dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
    let seed = dir.join(format!("{}-seed", name));
    let remote = dir.join(format!("{}.git", name));
    tokio::fs::create_dir_all(seed.join("src/nested")).await?;
    tokio::fs::write(seed.join("README.md"), format!("# {}\n", name)).await?;
    tokio::fs::write(seed.join("src/lib.txt"), "lib\n").await?;
    tokio::fs::write(seed.join("src/nested/mod.txt"), "mod\n").await?;

    git(&seed, ["init", "--quiet", "--initial-branch=main"]).await?;
    git(&seed, ["config", "user.name", "Test User"]).await?;
    git(&seed, ["config", "user.email", "test@example.com"]).await?;
    git(&seed, ["config", "commit.gpgsign", "false"]).await?;
    git(&seed, ["add", "."]).await?;
    git(&seed, ["commit", "--quiet", "-m", "Initial commit"]).await?;
    git(
        dir,
        [
            OsStr::new("clone"),
            OsStr::new("--quiet"),
            OsStr::new("--bare"),
            seed.as_os_str(),
            remote.as_os_str(),
        ],
    )
    .await?;

    Ok(remote)
}

pub async fn rev_parse(repo: &Path, rev: &str) -> anyhow::Result<String> {
    git(repo, ["rev-parse", "--verify", "--quiet", rev]).await
}

pub async fn branch_exists(repo: &Path, branch: &str) -> bool {
    rev_parse(repo, &format!("refs/heads/{}", branch)).await.is_ok()
}

/// Creates `branch` at `start` directly in a (bare) repository.
pub async fn create_branch(repo: &Path, branch: &str, start: &str) -> anyhow::Result<()> {
    git(repo, ["branch", branch, start]).await?;
    Ok(())
}

/// `<status>\t<path>` for each file touched by `commit`.
pub async fn changed_files(repo: &Path, commit: &str) -> anyhow::Result<BTreeSet<String>> {
    let output = git(
        repo,
        ["diff-tree", "--no-commit-id", "--name-status", "-r", commit],
    )
    .await?;
    Ok(output.lines().map(String::from).collect())
}

/// Lists the files in `rev` of a (bare) repository.
pub async fn ls_tree(repo: &Path, rev: &str) -> anyhow::Result<Vec<String>> {
    let output = git(repo, ["ls-tree", "-r", "--name-only", rev]).await?;
    Ok(output.lines().map(String::from).collect())
}

pub fn setup_logging() -> anyhow::Result<()> {
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let format = tracing_subscriber::fmt::format().with_timer(timer);
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;
    let subscriber = tracing_subscriber::fmt::layer()
        .event_format(format)
        .with_test_writer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_filter(filter);
    tracing_subscriber::registry().with(subscriber).init();
    Ok(())
}

pub enum TestDir {
    Temp(tempfile::TempDir),
    Kept(std::path::PathBuf),
}

impl TestDir {
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;

        if std::env::var("DEBUG_TESTS").is_ok() {
            let path = temp_dir.keep();
            eprintln!("Test directory kept at: {}", path.display());
            Ok(TestDir::Kept(path))
        } else {
            Ok(TestDir::Temp(temp_dir))
        }
    }

    pub fn path(&self) -> &std::path::Path {
        match self {
            TestDir::Temp(t) => t.path(),
            TestDir::Kept(p) => p.as_path(),
        }
    }
}
