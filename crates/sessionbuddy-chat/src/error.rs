//! Chat error taxonomy.
//!
//! Display strings are shown to the browser as-is, so they are written in the
//! UI's language.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    /// DNS, TCP, TLS, or timeout before a response arrived.
    #[error("{provider} API接続エラー: {message}")]
    Connection {
        provider: &'static str,
        message: String,
    },

    /// Upstream answered with a non-2xx status.
    #[error("{provider} API接続エラー: HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// Blocking response body could not be interpreted.
    #[error("予期しないエラー: {provider} APIの応答を解析できません: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    #[error("ストリーミングはDifyプロバイダーのみサポートしています")]
    StreamingUnsupported,

    #[error("リクエストが不正です: {0}")]
    InvalidRequest(String),
}

impl ChatError {
    /// Caller's fault rather than the upstream's.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ChatError::StreamingUnsupported | ChatError::InvalidRequest(_)
        )
    }

    pub(crate) fn connection(provider: &'static str, err: impl std::fmt::Display) -> Self {
        ChatError::Connection {
            provider,
            message: err.to_string(),
        }
    }
}
