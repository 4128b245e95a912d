use config::Config;
use sse::BroadcastEngine;
use std::sync::Arc;

pub mod config;
pub mod logging;

/// Builds the broadcast engine with the limits from `config`.
pub fn init_broadcast_engine(config: &Config) -> Arc<BroadcastEngine> {
    Arc::new(BroadcastEngine::new(config.engine_config()))
}

// Service-level state shared by every request handler
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub broadcast_engine: Arc<BroadcastEngine>,
    pub config: Config,
}

impl AppState {
    pub fn new(app_config: Config, engine: &Arc<BroadcastEngine>) -> Self {
        Self {
            broadcast_engine: Arc::clone(engine),
            config: app_config,
        }
    }

    pub fn engine(&self) -> &BroadcastEngine {
        self.broadcast_engine.as_ref()
    }
}
