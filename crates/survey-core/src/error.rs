#[derive(Debug, thiserror::Error)]
pub enum MissionError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("survey area input failed: {0}")]
    AreaInput(String),
}

/// A vehicle command (connect, arm, takeoff, goto, land) could not be issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} failed: {message}")]
pub struct TransportError {
    pub operation: String,
    pub message: String,
}

impl TransportError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("camera capture failed: {0}")]
pub struct CaptureError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("classification input failed: {0}")]
pub struct ClassificationError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("log append failed: {0}")]
    Append(String),
    #[error("log I/O: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("position feed closed")]
    Closed,
}
