//! Shared application state.

use sessionbuddy_chat::Provider;
use sessionbuddy_core::AppConfig;

/// State handed to every route handler. One per server instance.
pub struct AppState {
    pub config: AppConfig,
    pub provider: Provider,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let provider = Provider::from_config(&config.provider);
        Self { config, provider }
    }
}
