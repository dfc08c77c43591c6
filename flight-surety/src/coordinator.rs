//! Flight status coordinator.
//!
//! Opens status requests, routes them by index, collects oracle responses and
//! resolves a request as soon as one status code gathers `min_responses`
//! distinct responders. The first code to reach quorum wins; responses that
//! arrive after resolution are rejected, even if a different code would
//! eventually have gathered a larger majority.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

use crate::config::OracleConfig;
use crate::oracle::OracleAccount;
use crate::seed::routing_index;
use crate::types::{Account, FlightKey, Result, StatusCode, SuretyError};

/// A status request for one departure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightStatusRequest {
    /// Request ID for audit trails
    pub id: String,
    /// Departure being resolved
    pub key: FlightKey,
    /// Only oracles holding this index may answer
    pub routing_index: u8,
    /// Who opened the request
    pub requester: Account,
    /// Responders per reported status
    pub responses: BTreeMap<StatusCode, BTreeSet<Account>>,
    /// Final status once quorum is reached
    pub resolved_status: Option<StatusCode>,
    /// False once resolved
    pub open: bool,
    /// When the request was opened
    pub opened_at: DateTime<Utc>,
}

impl FlightStatusRequest {
    fn new(key: FlightKey, routing_index: u8, requester: Account) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            key,
            routing_index,
            requester,
            responses: BTreeMap::new(),
            resolved_status: None,
            open: true,
            opened_at: Utc::now(),
        }
    }

    /// Whether `oracle` has answered with any status.
    pub fn has_responded(&self, oracle: &Account) -> bool {
        self.responses.values().any(|set| set.contains(oracle))
    }

    /// Total responses received.
    pub fn response_count(&self) -> usize {
        self.responses.values().map(BTreeSet::len).sum()
    }
}

/// Compact record of a resolved request after an archive sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedRequest {
    pub id: String,
    pub key: FlightKey,
    pub routing_index: u8,
    pub resolved_status: StatusCode,
    pub response_count: usize,
}

/// Routing index of the latest request opened for a flight code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRequestIndex {
    pub airline: Account,
    pub flight: String,
    pub index: u8,
}

/// State of a status request as seen by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Still collecting responses
    Pending,
    /// Quorum reached
    Resolved(StatusCode),
}

/// What `open_request` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// A new request was created
    Opened,
    /// An open request already existed; nothing changed
    AlreadyOpen,
    /// The departure already resolved; nothing changed
    AlreadyResolved(StatusCode),
}

/// Result of `open_request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    pub request_id: String,
    pub key: FlightKey,
    pub routing_index: u8,
    pub outcome: OpenOutcome,
}

/// Result of an accepted oracle response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Response recorded; `count` responders now back `status`
    Recorded { status: StatusCode, count: usize },
    /// This response brought `status` to quorum and closed the request
    Resolved { status: StatusCode },
}

/// Owns every status request.
#[derive(Debug)]
pub struct FlightStatusCoordinator {
    config: OracleConfig,
    requests: HashMap<FlightKey, FlightStatusRequest>,
    archive: HashMap<FlightKey, ArchivedRequest>,
    last_index: HashMap<(Account, String), u8>,
}

impl FlightStatusCoordinator {
    pub fn new(config: OracleConfig) -> Self {
        Self {
            config,
            requests: HashMap::new(),
            archive: HashMap::new(),
            last_index: HashMap::new(),
        }
    }

    /// Routing index for a departure.
    pub fn routing_index_for(&self, key: &FlightKey) -> u8 {
        routing_index(key, self.config.index_space)
    }

    /// Open a status request, or return the existing one for the same key.
    pub fn open_request(&mut self, key: FlightKey, requester: &Account) -> RequestTicket {
        if let Some(existing) = self.requests.get(&key) {
            let outcome = match existing.resolved_status {
                Some(status) => OpenOutcome::AlreadyResolved(status),
                None => OpenOutcome::AlreadyOpen,
            };
            debug!(flight = %key, outcome = ?outcome, "Status request already exists");
            return RequestTicket {
                request_id: existing.id.clone(),
                key,
                routing_index: existing.routing_index,
                outcome,
            };
        }
        if let Some(archived) = self.archive.get(&key) {
            return RequestTicket {
                request_id: archived.id.clone(),
                key,
                routing_index: archived.routing_index,
                outcome: OpenOutcome::AlreadyResolved(archived.resolved_status),
            };
        }

        let index = self.routing_index_for(&key);
        let request = FlightStatusRequest::new(key.clone(), index, requester.clone());
        let ticket = RequestTicket {
            request_id: request.id.clone(),
            key: key.clone(),
            routing_index: index,
            outcome: OpenOutcome::Opened,
        };

        info!(
            request_id = %request.id,
            flight = %key,
            index = index,
            requester = %requester,
            "Status request opened"
        );

        self.last_index
            .insert((key.airline.clone(), key.flight.clone()), index);
        self.requests.insert(key, request);
        ticket
    }

    /// Record an oracle response; resolves the request on quorum.
    /// Validate a response without recording it.
    ///
    /// Returns whether recording it would resolve the request.
    pub fn check_response(
        &self,
        index: u8,
        key: &FlightKey,
        status: StatusCode,
        oracle: &OracleAccount,
    ) -> Result<bool> {
        let request = self
            .requests
            .get(key)
            .filter(|r| r.open)
            .ok_or_else(|| SuretyError::UnknownRequest(key.clone()))?;

        if !oracle.serves(index) || request.routing_index != index {
            return Err(SuretyError::IndexMismatch {
                oracle: oracle.id.clone(),
                index,
            });
        }
        if request.has_responded(&oracle.id) {
            return Err(SuretyError::AlreadyResponded {
                oracle: oracle.id.clone(),
                key: key.clone(),
            });
        }
        let agreeing = request.responses.get(&status).map_or(0, |r| r.len());
        Ok(agreeing + 1 >= self.config.min_responses)
    }

    pub fn submit_response(
        &mut self,
        index: u8,
        key: &FlightKey,
        status: StatusCode,
        oracle: &OracleAccount,
    ) -> Result<ResponseOutcome> {
        self.check_response(index, key, status, oracle)?;
        let min_responses = self.config.min_responses;
        let request = self
            .requests
            .get_mut(key)
            .filter(|r| r.open)
            .ok_or_else(|| SuretyError::UnknownRequest(key.clone()))?;

        let responders = request.responses.entry(status).or_default();
        responders.insert(oracle.id.clone());
        let count = responders.len();

        debug!(
            request_id = %request.id,
            oracle = %oracle.id,
            status = %status,
            count = count,
            "Oracle response recorded"
        );

        if count >= min_responses {
            request.resolved_status = Some(status);
            request.open = false;
            info!(
                request_id = %request.id,
                flight = %key,
                status = %status,
                "Status request resolved"
            );
            return Ok(ResponseOutcome::Resolved { status });
        }
        Ok(ResponseOutcome::Recorded { status, count })
    }

    /// Resolved status or pending.
    pub fn get_request_status(&self, key: &FlightKey) -> Result<RequestStatus> {
        if let Some(request) = self.requests.get(key) {
            return Ok(match request.resolved_status {
                Some(status) => RequestStatus::Resolved(status),
                None => RequestStatus::Pending,
            });
        }
        self.archive
            .get(key)
            .map(|a| RequestStatus::Resolved(a.resolved_status))
            .ok_or_else(|| SuretyError::UnknownRequest(key.clone()))
    }

    /// Live request record.
    pub fn request(&self, key: &FlightKey) -> Option<&FlightStatusRequest> {
        self.requests.get(key)
    }

    /// Routing index of the most recent request opened for a flight.
    pub fn last_request_index(&self, airline: &Account, flight: &str) -> Option<u8> {
        self.last_index
            .get(&(airline.clone(), flight.to_string()))
            .copied()
    }

    /// Keys of requests still collecting responses.
    pub fn open_requests(&self) -> Vec<FlightKey> {
        let mut keys: Vec<FlightKey> = self
            .requests
            .values()
            .filter(|r| r.open)
            .map(|r| r.key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Move resolved requests into the compact archive; open requests stay.
    pub fn archive_resolved(&mut self) -> usize {
        let resolved: Vec<FlightKey> = self
            .requests
            .values()
            .filter(|r| r.resolved_status.is_some())
            .map(|r| r.key.clone())
            .collect();

        for key in &resolved {
            if let Some(request) = self.requests.remove(key) {
                if let Some(status) = request.resolved_status {
                    let response_count = request.response_count();
                    self.archive.insert(
                        key.clone(),
                        ArchivedRequest {
                            id: request.id,
                            key: request.key,
                            routing_index: request.routing_index,
                            resolved_status: status,
                            response_count,
                        },
                    );
                }
            }
        }
        if !resolved.is_empty() {
            info!(archived = resolved.len(), "Resolved status requests archived");
        }
        resolved.len()
    }

    pub(crate) fn tables(&self) -> (Vec<FlightStatusRequest>, Vec<ArchivedRequest>, Vec<LastRequestIndex>) {
        let mut last_indexes: Vec<LastRequestIndex> = self
            .last_index
            .iter()
            .map(|((airline, flight), index)| LastRequestIndex {
                airline: airline.clone(),
                flight: flight.clone(),
                index: *index,
            })
            .collect();
        last_indexes.sort_by(|a, b| (&a.airline, &a.flight).cmp(&(&b.airline, &b.flight)));
        (
            self.requests.values().cloned().collect(),
            self.archive.values().cloned().collect(),
            last_indexes,
        )
    }

    pub(crate) fn restore(
        &mut self,
        requests: Vec<FlightStatusRequest>,
        archive: Vec<ArchivedRequest>,
        last_indexes: Vec<LastRequestIndex>,
    ) {
        self.last_index = last_indexes
            .into_iter()
            .map(|l| ((l.airline, l.flight), l.index))
            .collect();
        self.requests = requests.into_iter().map(|r| (r.key.clone(), r)).collect();
        self.archive = archive.into_iter().map(|a| (a.key.clone(), a)).collect();
    }
}
