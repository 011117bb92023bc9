use placement_shared::ProtocolError;
use thiserror::Error;

/// Errors produced by the client layer.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Request could not be sent or the response body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Live channel handshake or transport failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The server answered with a failure; `message` is its text, verbatim.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// Input rejected before any network call.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// No subject identity is logged in.
    #[error("No active session")]
    NoSession,

    #[error("Live connection is not open")]
    NotConnected,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
