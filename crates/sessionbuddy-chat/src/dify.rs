//! Dify chat-messages API client.
//!
//! Both modes POST the same body to `/v1/chat-messages`; only
//! `response_mode` differs. Streaming responses are handed to the relay.

use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::json;
use sessionbuddy_core::DifyConfig;
use tracing::{debug, warn};

use crate::error::ChatError;
use crate::provider::{error_body, EventStream, UPSTREAM_TIMEOUT};
use crate::relay;

const PROVIDER: &str = "Dify";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    Blocking,
    Streaming,
}

pub struct DifyClient {
    client: Client,
    config: DifyConfig,
}

impl DifyClient {
    pub fn new(client: Client, config: DifyConfig) -> Self {
        Self { client, config }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1/chat-messages", self.config.base_url)
    }

    pub fn request_body(&self, message: &str, mode: ResponseMode) -> serde_json::Value {
        json!({
            "inputs": {},
            "query": message,
            "response_mode": mode,
            "user": self.config.user,
        })
    }

    /// Blocking mode: wait for the full answer.
    pub async fn send(&self, message: &str) -> Result<String, ChatError> {
        debug!("Dify blocking request to {}", self.endpoint());

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(message, ResponseMode::Blocking))
            .timeout(UPSTREAM_TIMEOUT)
            .send()
            .await
            .map_err(|e| ChatError::connection(PROVIDER, e))?;

        let response = check_status(response).await?;

        let data: serde_json::Value = response.json().await.map_err(|e| ChatError::Decode {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        Ok(data
            .get("answer")
            .and_then(|a| a.as_str())
            .unwrap_or_default()
            .to_string())
    }

    /// Streaming mode: connect, check the status, then relay the body.
    ///
    /// Connection failures and non-2xx statuses come back as `Err` before any
    /// event is produced.
    pub async fn open_stream(&self, message: &str) -> Result<EventStream, ChatError> {
        debug!("Dify streaming request to {}", self.endpoint());

        let request = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(message, ResponseMode::Streaming))
            .send();

        let response = match tokio::time::timeout(UPSTREAM_TIMEOUT, request).await {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => return Err(ChatError::connection(PROVIDER, e)),
            Err(_) => {
                return Err(ChatError::connection(
                    PROVIDER,
                    format!("no response within {}s", UPSTREAM_TIMEOUT.as_secs()),
                ))
            }
        };

        let response = check_status(response).await?;
        Ok(Box::pin(relay::relay(response.bytes_stream())))
    }
}

async fn check_status(response: Response) -> Result<Response, ChatError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = error_body(response).await;
    warn!("Dify API error {}: {}", status, body);
    Err(ChatError::Status {
        provider: PROVIDER,
        status: status.as_u16(),
        body,
    })
}
