use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;
use tracing::instrument;

use super::github_curl::GithubCurlClient;
use super::github_curl::HttpError;
use crate::config::Token;
use crate::paginate::Page;
use crate::source::RepositoryRef;

/// Repositories requested per listing page (the API maximum).
pub const PAGE_SIZE: u32 = 100;

// -----------------------------------------------------------------------------
// RepoHost trait

/// Operations against the code-hosting service.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// Fetch one page of an organisation's repositories.
    async fn list_org_repos(&self, org: &str, page: u32) -> Result<Page<RepositoryRef>>;

    /// Look up a single repository. Returns `None` if it does not exist.
    async fn get_repo(&self, owner: &str, name: &str) -> Result<Option<RepositoryRef>>;

    /// Open a pull request and return its URL
    async fn create_pull_request(
        &self,
        repo: &RepositoryRef,
        request: &NewPullRequest,
    ) -> Result<String>;
}

/// Body of a pull request creation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
    pub draft: bool,
}

// -----------------------------------------------------------------------------
// Types

/// Client to interact with the GitHub REST API.
pub struct GithubClient {
    api_base: String,
    page_size: u32,
    http_client: GithubCurlClient,
}

#[derive(Debug, Deserialize)]
struct Repository {
    name: String,
    owner: Owner,
    clone_url: String,
    default_branch: String,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    fork: bool,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    html_url: String,
}

impl From<Repository> for RepositoryRef {
    fn from(repo: Repository) -> Self {
        Self {
            owner: repo.owner.login,
            name: repo.name,
            clone_url: repo.clone_url,
            default_branch: repo.default_branch,
            archived: repo.archived,
            fork: repo.fork,
        }
    }
}

// -----------------------------------------------------------------------------
// GithubClient impl

impl GithubClient {
    pub fn new(token: Token, api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            page_size: PAGE_SIZE,
            http_client: GithubCurlClient::new(token),
        }
    }

    /// Override the listing page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[async_trait]
impl RepoHost for GithubClient {
    #[instrument(skip_all, fields(org = %org, page = page))]
    async fn list_org_repos(&self, org: &str, page: u32) -> Result<Page<RepositoryRef>> {
        let url = format!(
            "{}/orgs/{}/repos?sort=full_name&per_page={}&page={}",
            self.api_base, org, self.page_size, page
        );

        let response = self.http_client.get(&url).await?;
        let repos: Vec<Repository> =
            serde_json::from_str(&response).context("Failed to parse repository listing")?;
        let repos = repos.into_iter().map(RepositoryRef::from).collect();
        Ok(Page::sized(repos, page, self.page_size))
    }

    #[instrument(skip_all, fields(owner = %owner, name = %name))]
    async fn get_repo(&self, owner: &str, name: &str) -> Result<Option<RepositoryRef>> {
        let url = format!("{}/repos/{}/{}", self.api_base, owner, name);

        match self.http_client.get(&url).await {
            Ok(response) => {
                let repo: Repository =
                    serde_json::from_str(&response).context("Failed to parse repository")?;
                Ok(Some(repo.into()))
            }
            Err(err)
                if err
                    .downcast_ref::<HttpError>()
                    .is_some_and(HttpError::is_not_found) =>
            {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    #[instrument(skip_all, fields(repo = %repo.full_name()))]
    async fn create_pull_request(
        &self,
        repo: &RepositoryRef,
        request: &NewPullRequest,
    ) -> Result<String> {
        let url = format!(
            "{}/repos/{}/{}/pulls",
            self.api_base, repo.owner, repo.name
        );

        let json_data = serde_json::to_string(request)?;
        let response = self.http_client.post(&url, &json_data).await?;
        let pr: PullRequest =
            serde_json::from_str(&response).context("Failed to parse pull request")?;
        Ok(pr.html_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_json_into_ref() {
        let json = r#"{
            "name": "cloud-platform-cli",
            "full_name": "acme/cloud-platform-cli",
            "owner": {"login": "acme"},
            "clone_url": "https://github.com/acme/cloud-platform-cli.git",
            "default_branch": "main",
            "archived": true
        }"#;
        let repo: RepositoryRef = serde_json::from_str::<Repository>(json).unwrap().into();
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.name, "cloud-platform-cli");
        assert_eq!(repo.default_branch, "main");
        assert!(repo.archived);
        assert!(!repo.fork);
    }

    #[test]
    fn test_new_pull_request_json() {
        let request = NewPullRequest {
            title: "bump".to_string(),
            head: "update".to_string(),
            base: "main".to_string(),
            body: String::new(),
            draft: false,
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"title":"bump","head":"update","base":"main","body":"","draft":false}"#
        );
    }

    #[test]
    fn test_api_base_trailing_slash() {
        let client = GithubClient::new(Token::new("t"), "http://localhost:8080/");
        assert_eq!(client.api_base, "http://localhost:8080");
    }
}
