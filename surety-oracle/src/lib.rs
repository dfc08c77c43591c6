//! Surety Oracle - simulated oracle workers
//!
//! Registers a pool of oracle accounts with a [`flight_surety::SuretyService`],
//! listens for routed status requests and answers them from a pluggable
//! [`StatusProvider`].

pub mod error;
pub mod network;
pub mod provider;

pub use error::{OracleNetworkError, Result};
pub use network::{NetworkConfig, NetworkHandle, OracleNetwork, OracleWorker};
pub use provider::{FixedStatusProvider, ProviderKind, RandomStatusProvider, StatusProvider};
