use thiserror::Error;

/// Guest disk inspection error types
#[derive(Error, Debug)]
pub enum InspectError {
    /// Inspection found zero or several root operating systems
    #[error("Expected exactly one root filesystem, found {}", found.len())]
    AmbiguousRoot { found: Vec<String> },

    /// A partition could not be mounted into the guest tree
    #[error("Failed to mount {partition} on {mountpoint}: {message}")]
    MountFailed {
        mountpoint: String,
        partition: String,
        message: String,
    },

    /// A record in the account database could not be parsed
    #[error("Malformed account record at line {line}: {reason}")]
    MalformedAccount { line: usize, reason: String },

    /// The inspection backend could not be started
    #[error("Disk launch failed: {message}")]
    LaunchFailed {
        message: String,
        hint: Option<String>,
    },

    /// An inspection primitive failed
    #[error("Backend error: {operation} - {message}")]
    Backend { operation: String, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl InspectError {
    /// Shorthand for a failed inspection primitive.
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        InspectError::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for InspectError {
    fn from(err: serde_json::Error) -> Self {
        InspectError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for InspectError {
    fn from(err: serde_yaml::Error) -> Self {
        InspectError::SerializationError(err.to_string())
    }
}

/// Result type alias for guest inspection operations
pub type Result<T> = std::result::Result<T, InspectError>;
