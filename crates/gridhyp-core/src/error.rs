//! Unified error type for the network model and its persistence helpers.
//!
//! Business-level dispatch failures (infeasible areas, consistency mismatches)
//! are never represented here; they are reported through
//! [`Diagnostics`](crate::Diagnostics). A [`GridError`] means the caller handed
//! over something malformed: an unknown generator, an out-of-range rate, a
//! profile file that does not parse.

use thiserror::Error;

/// Unified error type for gridhyp model operations.
#[derive(Error, Debug)]
pub enum GridError {
    /// I/O errors (profile or configuration files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network structure errors (unknown element, dangling reference)
    #[error("Network error: {0}")]
    Network(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using GridError.
pub type GridResult<T> = Result<T, GridError>;

impl From<anyhow::Error> for GridError {
    fn from(err: anyhow::Error) -> Self {
        GridError::Other(err.to_string())
    }
}

impl From<String> for GridError {
    fn from(s: String) -> Self {
        GridError::Other(s)
    }
}

impl From<&str> for GridError {
    fn from(s: &str) -> Self {
        GridError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        GridError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for GridError {
    fn from(err: toml::de::Error) -> Self {
        GridError::Parse(err.to_string())
    }
}
