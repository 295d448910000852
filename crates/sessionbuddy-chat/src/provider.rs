//! Provider selection: the configured backend behind one interface.

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use reqwest::{Client, Response};
use sessionbuddy_core::ProviderConfig;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use crate::dify::DifyClient;
use crate::error::ChatError;
use crate::gemini::GeminiClient;
use crate::types::StreamEvent;

/// Bound on waiting for an upstream answer (blocking) or its headers (streaming).
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a non-2xx body may take to arrive before it is given up on.
pub const ERROR_BODY_TIMEOUT: Duration = Duration::from_secs(2);
/// Upper bound on the part of a non-2xx body kept for the error message.
pub const ERROR_BODY_LIMIT: usize = 4 * 1024;

/// Boxed stream of relay events.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Read what an upstream sent along with an error status.
///
/// Only the first [`ERROR_BODY_LIMIT`] bytes are kept and the read stops at
/// [`ERROR_BODY_TIMEOUT`], so a stalled or endless body cannot hold up the
/// error reply.
pub(crate) async fn error_body(response: Response) -> String {
    let mut body = Vec::new();
    let chunks = response.bytes_stream();
    tokio::pin!(chunks);

    let read = async {
        while let Some(Ok(chunk)) = chunks.next().await {
            body.extend_from_slice(&chunk);
            if body.len() >= ERROR_BODY_LIMIT {
                break;
            }
        }
    };
    if tokio::time::timeout(ERROR_BODY_TIMEOUT, read).await.is_err() {
        debug!("Error body still incomplete after {}s", ERROR_BODY_TIMEOUT.as_secs());
    }

    body.truncate(ERROR_BODY_LIMIT);
    String::from_utf8_lossy(&body).into_owned()
}

pub enum Provider {
    Gemini(GeminiClient),
    Dify(DifyClient),
}

impl Provider {
    pub fn from_config(config: &ProviderConfig) -> Self {
        let client = Client::new();
        match config {
            ProviderConfig::Gemini(gemini) => {
                info!("Gemini provider initialised (model {})", gemini.model);
                Provider::Gemini(GeminiClient::new(client, gemini.clone()))
            }
            ProviderConfig::Dify(dify) => {
                info!("Dify provider initialised ({})", dify.base_url);
                Provider::Dify(DifyClient::new(client, dify.clone()))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini(_) => "gemini",
            Provider::Dify(_) => "dify",
        }
    }

    pub fn supports_streaming(&self) -> bool {
        matches!(self, Provider::Dify(_))
    }

    /// Blocking chat: the whole answer.
    pub async fn chat(&self, message: &str) -> Result<String, ChatError> {
        match self {
            Provider::Gemini(gemini) => gemini.send(message).await,
            Provider::Dify(dify) => dify.send(message).await,
        }
    }

    /// Streaming chat. Fails before producing any event when the upstream
    /// cannot be reached or the provider has no streaming mode.
    pub async fn chat_stream(&self, message: &str) -> Result<EventStream, ChatError> {
        match self {
            Provider::Gemini(_) => Err(ChatError::StreamingUnsupported),
            Provider::Dify(dify) => dify.open_stream(message).await,
        }
    }
}
