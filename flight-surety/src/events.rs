//! Domain events emitted by the engine.
//!
//! Oracle workers learn about new status requests from [`SuretyEvent::OracleRequest`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Account, Amount, FlightKey, StatusCode};

/// Something that happened inside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuretyEvent {
    /// Owner flipped the operating gate
    OperatingStatusChanged { operational: bool },
    /// An oracle registered
    OracleRegistered { oracle: Account, indexes: Vec<u8> },
    /// An airline paid its participation fee
    AirlineFunded { airline: Account, fee: Amount },
    /// A vote for a candidate airline was recorded
    AirlineVoted {
        candidate: Account,
        voter: Account,
        votes: usize,
        required: usize,
    },
    /// A candidate airline became registered
    AirlineRegistered { airline: Account, name: String },
    /// An airline registered a flight
    FlightRegistered { flight: FlightKey },
    /// A status request was opened; oracles holding `index` should answer
    OracleRequest { index: u8, flight: FlightKey },
    /// An oracle response was accepted
    OracleReport {
        oracle: Account,
        flight: FlightKey,
        status: StatusCode,
    },
    /// A status request reached quorum
    FlightStatusInfo { flight: FlightKey, status: StatusCode },
    /// A passenger bought insurance
    InsurancePurchased {
        policy_id: u64,
        passenger: Account,
        flight: FlightKey,
        premium: Amount,
    },
    /// A policy payout was credited
    PayoutCredited {
        policy_id: u64,
        passenger: Account,
        amount: Amount,
    },
    /// A balance was withdrawn
    Withdrawn { account: Account, amount: Amount },
}

/// An event with the time the engine recorded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Position in the engine's event stream
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: SuretyEvent,
}
