use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Payment not found: {0}")]
    NotFound(String),
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    #[error("Unexpected gateway response: {0}")]
    UnexpectedResponse(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Tracker task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
