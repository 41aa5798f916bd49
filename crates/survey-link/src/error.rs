#[derive(Debug, thiserror::Error)]
pub enum VehicleError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("vehicle disconnected")]
    Disconnected,
    #[error("not connected to a vehicle")]
    NotConnected,
    #[error("operation timed out")]
    Timeout,
    #[error("operation cancelled")]
    Cancelled,
    #[error("command {command} rejected: {result}")]
    CommandRejected { command: String, result: String },
    #[error("no heartbeat received yet")]
    IdentityUnknown,
    #[error("MAVLink I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl VehicleError {
    pub(crate) fn io(err: impl std::fmt::Display) -> Self {
        VehicleError::Io(std::io::Error::other(err.to_string()))
    }
}
