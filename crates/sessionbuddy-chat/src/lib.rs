//! Chat relay toward external conversational backends (Gemini/Dify).
//!
//! Blocking requests return the whole answer at once. Streaming requests
//! translate the upstream SSE body into a lazy stream of [`StreamEvent`]s
//! that the server re-frames for the browser.

pub mod dify;
pub mod error;
pub mod gemini;
pub mod provider;
pub mod relay;
pub mod types;

pub use error::ChatError;
pub use provider::Provider;
pub use types::*;
