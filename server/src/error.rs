//! Error types for the game server.

use thiserror::Error;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or accepting on the listener failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or framing failed.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Level data is unusable.
    #[error("Invalid level: {0}")]
    Level(String),

    /// The coordinator's event loop is gone.
    #[error("Event channel closed")]
    ChannelClosed,
}
