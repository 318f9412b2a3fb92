//! Application State
//!
//! Holds the configuration and the protocol dispatcher shared by every route.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use activesync_core::{
    ConfiguredBackend, CommandRouter, DeviceRegistry, DeviceStore, Dispatcher,
};
use activesync_types::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub config: Arc<ServerConfig>,
    pub dispatcher: Arc<Dispatcher>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// State backed by the configured accounts, with no command handlers.
    pub fn new(config: ServerConfig, store: Arc<dyn DeviceStore>) -> Self {
        Self::with_router(config, store, CommandRouter::new())
    }

    /// State with the given command handlers installed.
    pub fn with_router(
        config: ServerConfig,
        store: Arc<dyn DeviceStore>,
        router: CommandRouter,
    ) -> Self {
        let config = Arc::new(config);
        let backend = Arc::new(ConfiguredBackend::new(config.clone()));
        let registry = DeviceRegistry::new(store);
        let dispatcher = Dispatcher::new(config.clone(), backend, registry, router);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                dispatcher: Arc::new(dispatcher),
                started_at: Utc::now(),
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn registry(&self) -> &DeviceRegistry {
        self.inner.dispatcher.registry()
    }
}
