//! Error types for dbwrap

use thiserror::Error;

/// Result type alias for dbwrap operations
pub type DbResult<T> = Result<T, DbError>;

/// Error types for database operations.
///
/// Driver errors never cross this boundary as driver types: they are carried
/// as text in [`DbError::QueryFailed`] / [`DbError::ExecutionFailed`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DbError {
    /// Malformed table or column name
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Negative limit, parameter count mismatch, empty column list, ...
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation attempted without a live connection
    #[error("Not connected")]
    NotConnected,

    /// Driver-reported failure while reading
    #[error("Query failed: {cause}")]
    QueryFailed { cause: String },

    /// Driver-reported failure while writing
    #[error("Execution failed: {cause}")]
    ExecutionFailed { cause: String },

    /// Connection could not be established
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration or log sink setup error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Row decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },
}

impl DbError {
    /// Create an invalid identifier error
    pub fn invalid_identifier(message: impl Into<String>) -> Self {
        Self::InvalidIdentifier(message.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn query_failed(cause: impl ToString) -> Self {
        Self::QueryFailed {
            cause: cause.to_string(),
        }
    }

    pub fn execution_failed(cause: impl ToString) -> Self {
        Self::ExecutionFailed {
            cause: cause.to_string(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this is a not-connected error
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected)
    }

    /// Check if this is an invalid identifier error
    pub fn is_invalid_identifier(&self) -> bool {
        matches!(self, Self::InvalidIdentifier(_))
    }

    /// Check if this is an invalid argument error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// The driver diagnostic carried by a query or execution failure.
    pub fn cause(&self) -> Option<&str> {
        match self {
            Self::QueryFailed { cause } | Self::ExecutionFailed { cause } => Some(cause),
            _ => None,
        }
    }
}

