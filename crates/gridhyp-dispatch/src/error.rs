use gridhyp_core::GridError;
use thiserror::Error;

/// Errors crossing the top-level dispatch call.
///
/// Infeasible areas, consistency mismatches and regional precision losses are
/// not errors; they are recorded in the report diagnostics.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Unsupported or out-of-range configuration value
    #[error("Dispatch configuration error: {0}")]
    Config(String),

    /// Documented precondition violated by the caller
    #[error("Dispatch precondition violated: {0}")]
    Precondition(String),

    /// Failure from the network model
    #[error(transparent)]
    Grid(#[from] GridError),
}
