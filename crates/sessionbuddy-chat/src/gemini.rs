//! Gemini generateContent client with an in-process chat history.
//!
//! Each successful exchange is appended to the history so follow-up messages
//! are answered in context. The history lives as long as the client does.

use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sessionbuddy_core::GeminiConfig;
use tracing::{debug, warn};

use crate::error::ChatError;
use crate::provider::{error_body, UPSTREAM_TIMEOUT};

const PROVIDER: &str = "Gemini";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn with_role(role: &str, text: &str) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }

    pub fn user(text: &str) -> Self {
        Self::with_role("user", text)
    }

    pub fn model(text: &str) -> Self {
        Self::with_role("model", text)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateResponse {
    /// Text of the first candidate, parts concatenated.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        Some(content.parts.iter().map(|p| p.text.as_str()).collect())
    }
}

pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
    history: Mutex<Vec<Content>>,
}

impl GeminiClient {
    pub fn new(client: Client, config: GeminiConfig) -> Self {
        Self {
            client,
            config,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }

    /// Request for `message` on top of the current history.
    pub fn build_request(&self, message: &str) -> GenerateRequest {
        let mut contents = self.history.lock().clone();
        contents.push(Content::user(message));
        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: self.config.system_instruction.clone(),
                }],
            },
            contents,
        }
    }

    pub async fn send(&self, message: &str) -> Result<String, ChatError> {
        let request = self.build_request(message);
        debug!(
            "Gemini request to model {} with {} prior turns",
            self.config.model,
            request.contents.len() - 1
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .timeout(UPSTREAM_TIMEOUT)
            .send()
            .await
            .map_err(|e| ChatError::connection(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            warn!("Gemini API error {}: {}", status, body);
            return Err(ChatError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| ChatError::Decode {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        let text = parsed.text().ok_or_else(|| ChatError::Decode {
            provider: PROVIDER,
            message: "response has no candidates".into(),
        })?;

        let mut history = self.history.lock();
        history.push(Content::user(message));
        history.push(Content::model(&text));

        Ok(text)
    }
}
