// Library exports for the API server, the operator CLI and tests
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use config::Config;
use db::Storage;
use services::{auth::AuthService, realtime::Hub};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub auth: Arc<AuthService>,
    pub hub: Arc<Hub>,
    pub config: Arc<Config>,
    /// Login rate limiting is skipped when unset.
    pub redis: Option<redis::aio::MultiplexedConnection>,
}

impl AppState {
    /// State with in-process fan-out and no Redis.
    pub fn new(storage: Arc<dyn Storage>, config: Config) -> Self {
        Self {
            storage,
            auth: Arc::new(AuthService::from_config(&config)),
            hub: Arc::new(Hub::new()),
            config: Arc::new(config),
            redis: None,
        }
    }

    pub fn with_redis(mut self, conn: redis::aio::MultiplexedConnection, hub: Arc<Hub>) -> Self {
        self.redis = Some(conn);
        self.hub = hub;
        self
    }
}
