use std::sync::Arc;

use crate::clients::github::RepoHost;
use crate::config::Config;
use crate::error::DiscoveryError;
use crate::source;
use crate::source::RepositoryRef;

pub struct App {
    pub config: Arc<Config>,
    pub host: Arc<dyn RepoHost>,
}

impl App {
    pub fn new(config: Config, host: Arc<dyn RepoHost>) -> Self {
        Self {
            config: Arc::new(config),
            host,
        }
    }
}

/// Shared helper methods for App
impl App {
    /// Resolve the configured selection into the repositories to act on.
    pub(crate) async fn resolve_repositories(&self) -> Result<Vec<RepositoryRef>, DiscoveryError> {
        source::resolve(
            self.host.as_ref(),
            &self.config.organisation,
            &self.config.selection,
            self.config.filters,
        )
        .await
    }
}
