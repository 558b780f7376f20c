//! Test helpers that need the crate's own types. Plain git fixtures live in
//! `tests/utils.rs` and are shared with the integration tests.

use std::path::Path;

use crate::config::Author;
use crate::source::RepositoryRef;

#[path = "../tests/utils.rs"]
mod fixtures;

pub use fixtures::changed_files;
pub use fixtures::create_branch;
pub use fixtures::create_remote;
pub use fixtures::rev_parse;

pub fn author() -> Author {
    Author {
        name: "Test User".to_string(),
        email: "test@example.com".to_string(),
    }
}

/// A repository reference with placeholder URLs, for tests that never clone.
pub fn repo_ref(name: &str) -> RepositoryRef {
    RepositoryRef {
        owner: "acme".to_string(),
        name: name.to_string(),
        clone_url: format!("https://github.com/acme/{}.git", name),
        default_branch: "main".to_string(),
        archived: false,
        fork: false,
    }
}

/// A repository reference whose clone URL is a local bare repository.
pub fn local_repo_ref(name: &str, remote: &Path) -> RepositoryRef {
    RepositoryRef {
        clone_url: remote.display().to_string(),
        ..repo_ref(name)
    }
}
