//! Session Buddy Core — runtime configuration and shared error types.

pub mod config;
pub mod error;

pub use config::{AppConfig, DifyConfig, GeminiConfig, ProviderConfig, ServerConfig, UiConfig};
pub use error::{Error, Result};
