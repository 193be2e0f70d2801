use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Unexpected frame type: {0}")]
    UnexpectedFrame(String),

    #[error("Channel is not open")]
    ChannelNotOpen,

    #[error("Relay index {0} out of range (expected 0..{})", crate::snapshot::RELAY_COUNT)]
    InvalidRelay(usize),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
