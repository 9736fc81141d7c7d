//! Application state shared across handlers.

use crate::auth::BasicAuth;
use crate::config::Config;
use crate::error::Result;
use crate::upstream::UpstreamClient;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Upstream media server client, owning the metadata cache.
    pub upstream: UpstreamClient,
    /// Client authentication.
    pub auth: Arc<BasicAuth>,
}

impl AppState {
    /// Create application state from configuration.
    pub fn new(config: Config) -> Result<Self> {
        let upstream = UpstreamClient::new(&config.upstream, config.cache.ttl())?;
        let auth = BasicAuth::from_config(&config.auth);

        Ok(Self {
            config: Arc::new(config),
            upstream,
            auth: Arc::new(auth),
        })
    }

    /// Catalog title.
    pub fn title(&self) -> &str {
        &self.config.server.title
    }
}
