//! Client error taxonomy.

use thiserror::Error;

/// Errors from talking to the page server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network, DNS or timeout failure before a response arrived.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response that is not a version conflict.
    #[error("server rejected request with status {status}: {body}")]
    ServerRejection { status: u16, body: String },

    /// HTTP 409: the server already holds different content.
    #[error("version conflict")]
    VersionConflict { server_content: String },

    /// Push channel failed to connect or broke.
    #[error("channel failure: {0}")]
    Channel(String),

    /// Response body did not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Endpoint URL could not be built.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Short machine-friendly name for the taxonomy bucket, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Transport(_) | ClientError::Url(_) => "transport_failure",
            ClientError::ServerRejection { .. } | ClientError::Decode(_) => "server_rejection",
            ClientError::VersionConflict { .. } => "version_conflict",
            ClientError::Channel(_) => "channel_failure",
        }
    }
}

/// Errors loading [`ClientConfig`](crate::config::ClientConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(String),
}
