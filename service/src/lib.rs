use cable::BroadcastHub;
use config::Config;
use std::sync::Arc;

pub mod config;
pub mod logging;

// Service-level state shared by every handler.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub hub: Arc<BroadcastHub>,
}

impl AppState {
    pub fn new(app_config: Config, hub: &Arc<BroadcastHub>) -> Self {
        Self {
            config: app_config,
            hub: Arc::clone(hub),
        }
    }
}
