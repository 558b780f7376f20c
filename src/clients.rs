//! Clients for the external systems a run talks to.
//!
//! - [`git`]: Working-copy operations over the git CLI (clone, branch, status, commit, push)
//! - [`github`]: The [`github::RepoHost`] trait and its GitHub REST implementation
//! - [`github_curl`]: Curl-based HTTP client for making GitHub API requests

pub mod git;
pub mod github;
pub mod github_curl;
