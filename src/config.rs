use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable holding the GitHub access token.
pub const TOKEN_ENV_VAR: &str = "GITHUB_OAUTH_TOKEN";

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_BRANCH: &str = "update";
pub const DEFAULT_COMMIT_MESSAGE: &str = "perform command on repository";
pub const DEFAULT_SCRATCH_ROOT: &str = "./tmp";
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Immutable configuration for one run, shared by every repository task.
#[derive(Debug, Clone)]
pub struct Config {
    pub organisation: String,
    pub selection: Selection,
    pub filters: RepoFilters,
    pub command: String,
    pub commit_message: String,
    pub branch: String,
    pub skip_commit: bool,
    pub loop_dir: bool,
    pub draft: bool,
    pub concurrency: usize,
    pub command_timeout: Option<Duration>,
    pub scratch_root: PathBuf,
    pub keep_workspaces: bool,
    pub author: Option<Author>,
    pub api_base: String,
    pub token: Token,
}

/// How the target repositories are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every repository in the organisation whose name contains this substring.
    Pattern(String),
    /// A newline-delimited file of repository names.
    ListFile(PathBuf),
}

/// Extra exclusions applied when listing an organisation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepoFilters {
    pub exclude_archived: bool,
    pub exclude_forks: bool,
}

/// Identity recorded on the commit. Falls back to the user's git config when unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

/// GitHub access token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Read the token from [`TOKEN_ENV_VAR`]. An unset or empty variable is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(TOKEN_ENV_VAR) {
            Ok(token) if !token.trim().is_empty() => Ok(Self(token.trim().to_string())),
            _ => Err(ConfigError::MissingToken(TOKEN_ENV_VAR)),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

impl Selection {
    /// Build a selection from the two mutually exclusive CLI flags.
    pub fn from_flags(
        pattern: Option<String>,
        list_file: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        match (pattern, list_file) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingSelection),
            (Some(pattern), None) => Ok(Selection::Pattern(pattern)),
            (None, Some(path)) => Ok(Selection::ListFile(path)),
            (None, None) => Err(ConfigError::NoSelection),
        }
    }
}

impl Config {
    /// Create a config with defaults for everything but the selection and token.
    pub fn new(organisation: String, selection: Selection, token: Token) -> Self {
        Self {
            organisation,
            selection,
            filters: RepoFilters::default(),
            command: String::new(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            skip_commit: false,
            loop_dir: false,
            draft: false,
            concurrency: DEFAULT_CONCURRENCY,
            command_timeout: None,
            scratch_root: PathBuf::from(DEFAULT_SCRATCH_ROOT),
            keep_workspaces: false,
            author: None,
            api_base: DEFAULT_API_BASE.to_string(),
            token,
        }
    }

    /// Check everything a `run` needs before any repository is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command.trim().is_empty() {
            return Err(ConfigError::NoCommand);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        Ok(())
    }

    /// Config for tests: a fixed author and a scratch root under `scratch_root`.
    pub fn default_for_tests(scratch_root: PathBuf) -> Self {
        let mut config = Self::new(
            "acme".to_string(),
            Selection::Pattern(String::new()),
            Token::new("test-token"),
        );
        config.command = "true".to_string();
        config.scratch_root = scratch_root;
        config.author = Some(Author {
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
        });
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_from_flags() {
        assert_eq!(
            Selection::from_flags(Some("cloud".to_string()), None),
            Ok(Selection::Pattern("cloud".to_string()))
        );
        assert_eq!(
            Selection::from_flags(None, Some(PathBuf::from("repos.txt"))),
            Ok(Selection::ListFile(PathBuf::from("repos.txt")))
        );
        assert_eq!(
            Selection::from_flags(Some("cloud".to_string()), Some(PathBuf::from("repos.txt"))),
            Err(ConfigError::ConflictingSelection)
        );
        assert_eq!(
            Selection::from_flags(None, None),
            Err(ConfigError::NoSelection)
        );
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default_for_tests(PathBuf::from("tmp"));
        assert_eq!(config.validate(), Ok(()));

        config.command = "  ".to_string();
        assert_eq!(config.validate(), Err(ConfigError::NoCommand));

        config.command = "touch file".to_string();
        config.concurrency = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidConcurrency));
    }

    #[test]
    fn test_token_is_redacted() {
        let token = Token::new("ghp_secret");
        assert_eq!(format!("{:?}", token), "Token(<redacted>)");
        assert_eq!(token.expose(), "ghp_secret");

        let config = Config::default_for_tests(PathBuf::from("tmp"));
        assert!(!format!("{:?}", config).contains("test-token"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::new(
            "acme".to_string(),
            Selection::Pattern("svc".to_string()),
            Token::new("t"),
        );
        assert_eq!(config.branch, "update");
        assert_eq!(config.commit_message, "perform command on repository");
        assert_eq!(config.scratch_root, PathBuf::from("./tmp"));
        assert_eq!(config.concurrency, 4);
        assert!(!config.skip_commit);
    }
}
