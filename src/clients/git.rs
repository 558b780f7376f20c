use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt;
use std::fmt::Display;
use std::os::unix::ffi::OsStrExt as _;
use std::path::Path;
use std::path::PathBuf;
use std::process::Output;
use std::process::Stdio;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::io::AsyncWriteExt as _;
use tokio::process::Command;

use crate::config::Author;
use crate::config::Token;

// -----------------------------------------------------------------------------
// Types

/// Git client bound to one working copy.
pub struct GitClient {
    path: PathBuf,
    auth: Option<BasicAuth>,
    author: Option<Author>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitId(pub String);

impl Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// HTTPS basic-auth credentials for clone and push.
#[derive(Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: Token,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl BasicAuth {
    fn header(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.password.expose());
        format!("Authorization: Basic {}", BASE64.encode(credentials))
    }
}

/// Working-tree state of a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Untracked,
    Modified,
    Deleted,
}

/// Uncommitted changes in a working copy, keyed by path relative to its root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet(BTreeMap<PathBuf, FileStatus>);

impl ChangeSet {
    pub fn is_clean(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<FileStatus> {
        self.0.get(path.as_ref()).copied()
    }

    pub fn untracked(&self) -> impl Iterator<Item = &Path> {
        self.0
            .iter()
            .filter(|(_, status)| **status == FileStatus::Untracked)
            .map(|(path, _)| path.as_path())
    }

    /// Parse `git status --porcelain=v1 -z` output.
    pub fn parse_porcelain(output: &[u8]) -> Result<Self> {
        let mut changes = BTreeMap::new();
        let mut entries = output.split(|b| *b == 0).filter(|e| !e.is_empty());

        while let Some(entry) = entries.next() {
            let entry = std::str::from_utf8(entry).context("Non UTF-8 path in git status")?;
            if entry.len() < 4 {
                bail!("Malformed git status entry: {:?}", entry);
            }
            let (code, path) = entry.split_at(3);
            let mut code = code.chars();
            let (x, y) = (code.next().unwrap_or(' '), code.next().unwrap_or(' '));

            // Renames and copies carry the source path as a separate entry
            if matches!(x, 'R' | 'C') {
                entries.next();
            }

            let status = match (x, y) {
                ('?', '?') => FileStatus::Untracked,
                ('D', _) | (_, 'D') => FileStatus::Deleted,
                _ => FileStatus::Modified,
            };
            changes.insert(PathBuf::from(path), status);
        }

        Ok(Self(changes))
    }
}

// -----------------------------------------------------------------------------
// GitClient impl

impl GitClient {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            auth: None,
            author: None,
        }
    }

    pub fn with_auth(mut self, auth: Option<BasicAuth>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_author(mut self, author: Option<Author>) -> Self {
        self.author = author;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clone `branch` of `url` into this client's directory, which must exist and be empty.
    pub async fn clone_into(&self, url: &str, branch: &str) -> Result<()> {
        let mut command = self.command();
        command.args(["clone", "--quiet", "--branch", branch, "--", url, "."]);
        run(command).await?;
        Ok(())
    }

    pub async fn head(&self) -> Result<CommitId> {
        let mut command = self.command();
        command.args(["rev-parse", "HEAD"]);
        let stdout = run(command).await?;
        Ok(CommitId(String::from_utf8(stdout)?.trim().to_string()))
    }

    /// Create `branch` at `start` and check it out, keeping working-tree changes.
    pub async fn create_branch(&self, branch: &str, start: &CommitId) -> Result<()> {
        let mut command = self.command();
        command.args(["checkout", "-b", branch, &start.0]);
        run(command).await?;
        Ok(())
    }

    pub async fn remote_branch_exists(&self, branch: &str) -> Result<bool> {
        let mut command = self.command();
        command.args(["ls-remote", "--heads", "origin", &format!("refs/heads/{}", branch)]);
        let stdout = run(command).await?;
        Ok(!String::from_utf8(stdout)?.trim().is_empty())
    }

    pub async fn status(&self) -> Result<ChangeSet> {
        let mut command = self.command();
        command.args(["status", "--porcelain=v1", "-z", "--untracked-files=all"]);
        let stdout = run(command).await?;
        ChangeSet::parse_porcelain(&stdout)
    }

    /// Stage `paths` literally. The paths go to git on stdin, so any number of
    /// them fits.
    pub async fn add<I, P>(&self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<OsStr>,
    {
        let mut pathspecs = Vec::new();
        for path in paths {
            pathspecs.extend_from_slice(path.as_ref().as_bytes());
            pathspecs.push(0);
        }

        let mut command = self.command();
        command
            .env("GIT_LITERAL_PATHSPECS", "1")
            .args(["add", "--pathspec-from-file=-", "--pathspec-file-nul"]);
        run_with_input(command, &pathspecs).await?;
        Ok(())
    }

    /// Commit the index plus every change to tracked files.
    pub async fn commit_all(&self, message: &str) -> Result<CommitId> {
        let mut command = self.command();
        if let Some(author) = &self.author {
            command
                .arg("-c")
                .arg(format!("user.name={}", author.name))
                .arg("-c")
                .arg(format!("user.email={}", author.email));
        }
        command.args(["commit", "--all", "--quiet", "--no-verify", "-m", message]);
        run(command).await?;
        self.head().await
    }

    pub async fn push_branch(&self, branch: &str) -> Result<()> {
        let refspec = format!("refs/heads/{}:refs/heads/{}", branch, branch);
        let mut command = self.command();
        command.args(["push", "--quiet", "-u", "origin", &refspec]);
        run(command).await?;
        Ok(())
    }

    /// A `git` command in this working copy. Credentials are passed through the
    /// environment so they never show up in arguments or `.git/config`.
    fn command(&self) -> Command {
        let mut command = Command::new("git");
        command
            .current_dir(&self.path)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(auth) = &self.auth {
            command
                .env("GIT_CONFIG_COUNT", "1")
                .env("GIT_CONFIG_KEY_0", "http.extraHeader")
                .env("GIT_CONFIG_VALUE_0", auth.header());
        }
        command
    }
}

async fn run(mut command: Command) -> Result<Vec<u8>> {
    let output = command
        .output()
        .await
        .context("Failed to execute git command")?;
    check(output)
}

/// Like [`run`], feeding `input` to the command's stdin.
async fn run_with_input(mut command: Command, input: &[u8]) -> Result<Vec<u8>> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to execute git command")?;
    let mut stdin = child.stdin.take().context("git stdin was not captured")?;

    // The child may fill its output pipes before it has read all of stdin
    let write = async move { stdin.write_all(input).await };
    let (written, output) = tokio::join!(write, child.wait_with_output());
    let output = check(output.context("Failed to execute git command")?)?;
    written.context("Failed to write to git stdin")?;
    Ok(output)
}

fn check(output: Output) -> Result<Vec<u8>> {
    if !output.status.success() {
        bail!(
            "git command failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(output.stdout)
}
