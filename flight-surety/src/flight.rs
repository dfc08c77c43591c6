//! Flight registry: departures airlines have put up for insurance.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::types::{Account, FlightKey, Result, StatusCode, SuretyError};

/// A registered flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    /// Operating airline
    pub airline: Account,
    /// Flight code
    pub code: String,
    /// Scheduled departure (unix seconds)
    pub timestamp: i64,
    /// Last resolved status, `Unknown` until a request resolves
    pub status_code: StatusCode,
    /// Whether a status request for this departure has resolved
    pub resolved: bool,
}

impl Flight {
    /// Key of this departure.
    pub fn key(&self) -> FlightKey {
        FlightKey::new(self.airline.clone(), self.code.clone(), self.timestamp)
    }
}

/// Flights keyed by `(airline, code)`.
#[derive(Debug, Default)]
pub struct FlightRegistry {
    flights: BTreeMap<(Account, String), Flight>,
}

impl FlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flight operated by `airline`.
    ///
    /// Admission checks on the airline are the engine's job.
    pub fn register_flight(&mut self, airline: &Account, code: &str, timestamp: i64) -> Result<FlightKey> {
        let slot = (airline.clone(), code.to_string());
        if self.flights.contains_key(&slot) {
            return Err(SuretyError::FlightAlreadyRegistered {
                airline: airline.clone(),
                flight: code.to_string(),
            });
        }

        let flight = Flight {
            airline: airline.clone(),
            code: code.to_string(),
            timestamp,
            status_code: StatusCode::Unknown,
            resolved: false,
        };
        let key = flight.key();
        info!(flight = %key, "Flight registered");
        self.flights.insert(slot, flight);
        Ok(key)
    }

    /// Look up a flight.
    pub fn flight(&self, airline: &Account, code: &str) -> Option<&Flight> {
        self.flights.get(&(airline.clone(), code.to_string()))
    }

    /// Flight or `UnknownFlight`.
    pub fn require_flight(&self, airline: &Account, code: &str) -> Result<&Flight> {
        self.flight(airline, code).ok_or_else(|| SuretyError::UnknownFlight {
            airline: airline.clone(),
            flight: code.to_string(),
        })
    }

    /// All flights, ordered by airline then code.
    pub fn flights(&self) -> Vec<Flight> {
        self.flights.values().cloned().collect()
    }

    /// Mirror a resolved status onto the matching departure.
    ///
    /// A resolution for a timestamp other than the registered one is ignored.
    pub fn record_status(&mut self, key: &FlightKey, status: StatusCode) -> bool {
        match self.flights.get_mut(&(key.airline.clone(), key.flight.clone())) {
            Some(flight) if flight.timestamp == key.timestamp && !flight.resolved => {
                flight.status_code = status;
                flight.resolved = true;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn restore(&mut self, flights: Vec<Flight>) {
        self.flights = flights
            .into_iter()
            .map(|f| ((f.airline.clone(), f.code.clone()), f))
            .collect();
    }
}
