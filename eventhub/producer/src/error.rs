use thiserror::Error;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum EventHubError {
    #[error("ConfigurationError: [{message}]")]
    ConfigurationError { message: String },
    #[error("ConnectionStringError: [{message}]")]
    ConnectionStringError { message: String },
    #[error("EventTooLarge: the event needs {size} bytes but a batch accepts at most {max_size} bytes")]
    EventTooLarge { size: usize, max_size: usize },
    #[error("SendError: [{message}], can_retry: {can_retry}, status: {status:?}")]
    SendError { message: String, can_retry: bool, status: Option<u16> },
    #[error("SerializationError: [{message}]")]
    SerializationError { message: String },
    #[error("ClientClosed: the producer client has already been closed")]
    ClientClosed,
}

impl EventHubError {
    /// Whether sending the same batch again could succeed.
    pub fn can_retry(&self) -> bool {
        match self {
            EventHubError::SendError { can_retry, .. } => *can_retry,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for EventHubError {
    fn from(error: serde_json::Error) -> Self {
        EventHubError::SerializationError { message: format!("{}", error) }
    }
}
