//! Oracle network errors.

use flight_surety::{Account, SuretyError};

/// Errors from running the oracle network.
#[derive(Debug, thiserror::Error)]
pub enum OracleNetworkError {
    /// A worker could not register
    #[error("Oracle {oracle} failed to register: {source}")]
    Registration {
        oracle: Account,
        source: SuretyError,
    },

    /// The background task panicked or was cancelled
    #[error("Oracle network task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, OracleNetworkError>;
