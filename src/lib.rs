pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use clock::Clock;
use config::Config;
use db::Store;
use services::notifications::NotificationService;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub clock: Clock,
    pub config: Arc<Config>,
    pub redis: Option<redis::aio::MultiplexedConnection>,
    pub notifications: NotificationService,
}

impl AppState {
    /// State without Redis or SMTP, as used by tests and `STORE=memory`.
    pub fn new(store: Arc<dyn Store>, clock: Clock, config: Config) -> Self {
        let notifications = NotificationService::new(None, config.app_base_url.clone());
        Self {
            store,
            clock,
            config: Arc::new(config),
            redis: None,
            notifications,
        }
    }
}
