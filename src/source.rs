//! Resolve the set of repositories a run acts on.

use std::path::Path;

use futures_util::TryStreamExt as _;
use tracing::debug;
use tracing::info;
use tracing::instrument;

use crate::clients::github::RepoHost;
use crate::config::RepoFilters;
use crate::config::Selection;
use crate::error::DiscoveryError;
use crate::paginate::paginate;

/// A remote repository, as resolved from the hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    /// Owner login, also used as the basic-auth username.
    pub owner: String,
    pub name: String,
    pub clone_url: String,
    pub default_branch: String,
    pub archived: bool,
    pub fork: bool,
}

impl RepositoryRef {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Resolve `selection` within `org`.
///
/// Any host failure aborts resolution; a partial list is never returned.
pub async fn resolve(
    host: &dyn RepoHost,
    org: &str,
    selection: &Selection,
    filters: RepoFilters,
) -> Result<Vec<RepositoryRef>, DiscoveryError> {
    match selection {
        Selection::Pattern(pattern) => resolve_pattern(host, org, pattern, filters).await,
        Selection::ListFile(path) => resolve_list_file(host, org, path).await,
    }
}

#[instrument(skip_all, fields(org = %org, pattern = %pattern))]
async fn resolve_pattern(
    host: &dyn RepoHost,
    org: &str,
    pattern: &str,
    filters: RepoFilters,
) -> Result<Vec<RepositoryRef>, DiscoveryError> {
    let listing_error = |source| DiscoveryError::Listing {
        org: org.to_string(),
        source,
    };

    let mut pages = std::pin::pin!(paginate(|page| host.list_org_repos(org, page)));
    let mut repos = Vec::new();
    let mut seen = 0;

    while let Some(page) = pages.try_next().await.map_err(listing_error)? {
        seen += page.len();
        repos.extend(page.into_iter().filter(|repo| {
            repo.name.contains(pattern)
                && !(filters.exclude_archived && repo.archived)
                && !(filters.exclude_forks && repo.fork)
        }));
    }

    info!(seen, matched = repos.len(), "Listed organisation repositories");
    Ok(repos)
}

#[instrument(skip_all, fields(org = %org, path = %path.display()))]
async fn resolve_list_file(
    host: &dyn RepoHost,
    org: &str,
    path: &Path,
) -> Result<Vec<RepositoryRef>, DiscoveryError> {
    let contents =
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| DiscoveryError::ReadList {
                path: path.to_path_buf(),
                source,
            })?;

    let mut repos = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let name = line.trim();
        if name.is_empty() {
            continue;
        }

        debug!(name, "Looking up repository");
        let repo = host
            .get_repo(org, name)
            .await
            .map_err(|source| DiscoveryError::Lookup {
                owner: org.to_string(),
                name: name.to_string(),
                source,
            })?
            .ok_or_else(|| DiscoveryError::NotFound {
                owner: org.to_string(),
                name: name.to_string(),
                line: index + 1,
            })?;
        repos.push(repo);
    }

    info!(count = repos.len(), "Resolved repositories from list");
    Ok(repos)
}
