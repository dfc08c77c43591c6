//! Core types shared by every engine component.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency amount in the smallest unit (wei-like).
pub type Amount = u128;

/// One whole currency unit expressed in the smallest unit.
pub const ETHER: Amount = 1_000_000_000_000_000_000;

/// Opaque, address-like account identifier supplied by the substrate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Account(String);

impl Account {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Render a 20-byte address as `0x`-prefixed hex.
    pub fn from_address(bytes: &[u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    /// Raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Account {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Account {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Flight status reported by oracles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    /// Status not known yet
    Unknown,
    /// Departed on time
    OnTime,
    /// Delayed through the airline's fault (the only insured outcome)
    LateAirline,
    /// Delayed by weather
    LateWeather,
    /// Delayed by a technical issue
    LateTechnical,
    /// Delayed for any other reason
    LateOther,
}

impl StatusCode {
    /// Every status an oracle may report.
    pub const ALL: [StatusCode; 6] = [
        StatusCode::Unknown,
        StatusCode::OnTime,
        StatusCode::LateAirline,
        StatusCode::LateWeather,
        StatusCode::LateTechnical,
        StatusCode::LateOther,
    ];

    /// Numeric wire code.
    pub fn code(self) -> u8 {
        match self {
            StatusCode::Unknown => 0,
            StatusCode::OnTime => 10,
            StatusCode::LateAirline => 20,
            StatusCode::LateWeather => 30,
            StatusCode::LateTechnical => 40,
            StatusCode::LateOther => 50,
        }
    }
}

impl TryFrom<u8> for StatusCode {
    type Error = SuretyError;

    fn try_from(code: u8) -> Result<Self> {
        StatusCode::ALL
            .into_iter()
            .find(|s| s.code() == code)
            .ok_or(SuretyError::InvalidStatusCode(code))
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Unknown => "UNKNOWN",
            StatusCode::OnTime => "ON_TIME",
            StatusCode::LateAirline => "LATE_AIRLINE",
            StatusCode::LateWeather => "LATE_WEATHER",
            StatusCode::LateTechnical => "LATE_TECHNICAL",
            StatusCode::LateOther => "LATE_OTHER",
        };
        write!(f, "{}({})", name, self.code())
    }
}

/// Identifies one departure of one flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlightKey {
    /// Operating airline
    pub airline: Account,
    /// Flight code, e.g. `ND1309`
    pub flight: String,
    /// Scheduled departure (unix seconds)
    pub timestamp: i64,
}

impl FlightKey {
    /// Create a flight key.
    pub fn new(airline: impl Into<Account>, flight: impl Into<String>, timestamp: i64) -> Self {
        Self {
            airline: airline.into(),
            flight: flight.into(),
            timestamp,
        }
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.airline, self.flight, self.timestamp)
    }
}

/// Broad class of a failure, telling the caller how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller is not allowed to do this; never retried automatically
    AccessControl,
    /// Caller must re-check state and retry with corrected input
    StatePrecondition,
    /// Caller must supply a corrected amount
    Resource,
    /// Repeat of something already applied; safe to ignore
    IdempotentNoop,
    /// Failure outside the engine (payout transfer, persistence, config)
    External,
}

/// Error types for the surety engine.
///
/// Every failed call leaves engine state unchanged.
#[derive(Debug, thiserror::Error)]
pub enum SuretyError {
    /// Global operating flag is off
    #[error("Engine is not operational")]
    NotOperational,

    /// Caller is not the contract owner
    #[error("Caller {0} is not the owner")]
    NotOwner(Account),

    /// Caller is not an authorized caller
    #[error("Caller {0} is not authorized")]
    NotAuthorized(Account),

    /// Calling airline has not paid its participation fee
    #[error("Airline {0} is not funded")]
    CallerNotFunded(Account),

    /// No open status request for the flight
    #[error("No open request for {0}")]
    UnknownRequest(FlightKey),

    /// No registered flight for airline and code
    #[error("Unknown flight {flight} for airline {airline}")]
    UnknownFlight { airline: Account, flight: String },

    /// Flight already registered by this airline
    #[error("Flight {flight} already registered for airline {airline}")]
    FlightAlreadyRegistered { airline: Account, flight: String },

    /// Flight status already resolved, insurance no longer on sale
    #[error("Flight {0} already resolved")]
    FlightAlreadyResolved(FlightKey),

    /// Oracle already registered
    #[error("Oracle {0} already registered")]
    AlreadyRegistered(Account),

    /// Oracle not registered
    #[error("Oracle {0} not registered")]
    NotRegistered(Account),

    /// Caller has no registered airline
    #[error("Airline {0} is not registered")]
    AirlineNotRegistered(Account),

    /// Routing index does not match the oracle or the request
    #[error("Index {index} does not match request for oracle {oracle}")]
    IndexMismatch { oracle: Account, index: u8 },

    /// Oracle already answered this request
    #[error("Oracle {oracle} already responded to {key}")]
    AlreadyResponded { oracle: Account, key: FlightKey },

    /// Status code outside the known set
    #[error("Invalid status code: {0}")]
    InvalidStatusCode(u8),

    /// Fee below the required amount
    #[error("Insufficient fee: required {required}, paid {paid}")]
    InsufficientFee { required: Amount, paid: Amount },

    /// Withdrawal above the available balance
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    /// Premium above the configured cap
    #[error("Premium {premium} exceeds cap {cap}")]
    PremiumExceedsCap { premium: Amount, cap: Amount },

    /// Arithmetic overflow on an amount
    #[error("Amount overflow")]
    AmountOverflow,

    /// External transfer effect failed; the debit was rolled back
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// Snapshot encoding error
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SuretyError {
    /// Category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SuretyError::NotOperational
            | SuretyError::NotOwner(_)
            | SuretyError::NotAuthorized(_)
            | SuretyError::CallerNotFunded(_) => ErrorCategory::AccessControl,
            SuretyError::UnknownRequest(_)
            | SuretyError::UnknownFlight { .. }
            | SuretyError::FlightAlreadyRegistered { .. }
            | SuretyError::FlightAlreadyResolved(_)
            | SuretyError::AlreadyRegistered(_)
            | SuretyError::NotRegistered(_)
            | SuretyError::AirlineNotRegistered(_)
            | SuretyError::IndexMismatch { .. }
            | SuretyError::InvalidStatusCode(_) => ErrorCategory::StatePrecondition,
            SuretyError::InsufficientFee { .. }
            | SuretyError::InsufficientBalance { .. }
            | SuretyError::PremiumExceedsCap { .. }
            | SuretyError::AmountOverflow => ErrorCategory::Resource,
            SuretyError::AlreadyResponded { .. } => ErrorCategory::IdempotentNoop,
            SuretyError::TransferFailed(_) | SuretyError::Snapshot(_) | SuretyError::Config(_) => {
                ErrorCategory::External
            }
        }
    }

    /// Whether an external retry that hit this error can be ignored.
    pub fn is_retry_safe(&self) -> bool {
        self.category() == ErrorCategory::IdempotentNoop
    }
}

pub type Result<T> = std::result::Result<T, SuretyError>;
