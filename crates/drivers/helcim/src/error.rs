use thiserror::Error;

/// Errors raised by the Helcim API client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Network failure, timeout or non-2xx response.
    ///
    /// `message` is the processor's error message when the response carried
    /// one, the raw error text otherwise.
    #[error("{message}")]
    Transport { status: Option<u16>, message: String },

    /// The processor answered 2xx with a body that is not the expected JSON
    #[error("Invalid JSON response from Helcim API: {0}")]
    Decode(String),

    /// The client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl ApiError {
    /// HTTP status of a failed response, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

/// Result type alias for Helcim API operations
pub type Result<T> = std::result::Result<T, ApiError>;
