//! Persisted engine state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SuretyConfig;
use crate::coordinator::{ArchivedRequest, FlightStatusRequest, LastRequestIndex};
use crate::escrow::Escrow;
use crate::flight::Flight;
use crate::governance::Airline;
use crate::identity::IdentityLedger;
use crate::insurance::InsurancePolicy;
use crate::oracle::OracleAccount;
use crate::types::{Account, Amount, Result};

/// Layout version written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 2;

/// Every table the engine owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub version: u32,
    pub taken_at: DateTime<Utc>,
    /// Configuration the engine ran under; a restore must use the same
    pub config: SuretyConfig,
    pub identity: IdentityLedger,
    pub airlines: Vec<Airline>,
    pub oracles: Vec<OracleAccount>,
    /// Rotating seed counter of the oracle registry
    pub oracle_counter: u64,
    pub flights: Vec<Flight>,
    pub requests: Vec<FlightStatusRequest>,
    pub archived_requests: Vec<ArchivedRequest>,
    pub last_request_indexes: Vec<LastRequestIndex>,
    pub policies: Vec<InsurancePolicy>,
    pub balances: Vec<(Account, Amount)>,
    pub escrow: Escrow,
}

impl EngineSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
