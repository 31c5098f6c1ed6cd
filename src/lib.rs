pub mod cli;
pub mod compat;
pub mod config;
pub mod content;
pub mod error;
pub mod filename;
pub mod handlers;
pub mod keys;
pub mod models;
pub mod upload;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{Config, ConfigStore};

pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub struct AppState {
    pub config: ConfigStore,
    /// Client for `type=url` uploads on the compat endpoint
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: ConfigStore, fetch_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(fetch_timeout)
            .build()?;
        Ok(Self { config, http })
    }

    /// Run `ConfigStore::reload` on the blocking pool, since it reads the
    /// config file and creates the storage directory.
    pub async fn reload_config(self: &Arc<Self>) -> Result<Arc<Config>, tokio::task::JoinError> {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || state.config.reload()).await
    }
}

/// Settings fixed for the lifetime of the listener.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    pub max_upload_size: usize,
    pub request_timeout: Duration,
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_upload_size: 256 * 1024 * 1024, // 256MB
            request_timeout: Duration::from_secs(300),
        }
    }
}

pub fn router(state: Arc<AppState>, limits: &ServerLimits) -> Router {
    Router::new()
        .merge(handlers::routes())
        .merge(compat::routes())
        .layer(DefaultBodyLimit::max(limits.max_upload_size))
        .layer(TimeoutLayer::new(limits.request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
