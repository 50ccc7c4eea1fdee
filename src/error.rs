use thiserror::Error;

/// Unified error type for the proxy cycler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CyclerError {
    // Validation errors
    #[error("Invalid proxy: {0}")]
    InvalidProxy(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for proxy cycler operations
pub type Result<T> = std::result::Result<T, CyclerError>;

impl CyclerError {
    /// Check if this error was caused by caller-supplied input to a pool operation
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            CyclerError::InvalidProxy(_)
                | CyclerError::InvalidTarget(_)
                | CyclerError::InvalidTimestamp(_)
        )
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for CyclerError {
    fn from(err: url::ParseError) -> Self {
        CyclerError::InvalidProxy(err.to_string())
    }
}
