//! Airline governance: funding and admission.
//!
//! While fewer than `bootstrap_size` airlines are registered, any funded
//! airline admits a candidate directly. From then on a candidate needs votes
//! from at least half of the registered airlines. The threshold is recomputed
//! against the registered count at the moment each vote is cast, so it can
//! move while a candidate is collecting votes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::config::{FeeConfig, GovernanceConfig};
use crate::types::{Account, Amount, Result, SuretyError};

/// An airline known to the federation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airline {
    pub id: Account,
    pub name: String,
    /// Participation fee paid; never reset
    pub funded: bool,
    pub registered: bool,
    /// Distinct supporters while the airline awaits admission
    pub votes: BTreeSet<Account>,
}

impl Airline {
    fn candidate(id: Account, name: String) -> Self {
        Self {
            id,
            name,
            funded: false,
            registered: false,
            votes: BTreeSet::new(),
        }
    }
}

/// Result of a registration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Admitted without a vote
    Direct,
    /// Vote recorded, threshold not yet met
    VoteRecorded { votes: usize, required: usize },
    /// Caller had already voted for this candidate; nothing changed
    DuplicateVote { votes: usize, required: usize },
    /// This vote met the threshold and admitted the candidate
    Elected { votes: usize, required: usize },
    /// Candidate was already registered; nothing changed
    AlreadyRegistered,
}

impl Admission {
    /// Whether the candidate is registered after this call.
    pub fn is_registered(&self) -> bool {
        matches!(
            self,
            Admission::Direct | Admission::Elected { .. } | Admission::AlreadyRegistered
        )
    }
}

/// Result of a funding call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundOutcome {
    /// Fee taken, airline now funded
    Funded,
    /// Airline was already funded; no fee taken
    AlreadyFunded,
}

/// Owns every airline record.
#[derive(Debug)]
pub struct AirlineGovernance {
    config: GovernanceConfig,
    airline_fee: Amount,
    airlines: BTreeMap<Account, Airline>,
}

impl AirlineGovernance {
    /// Create governance with the bootstrap airline seeded registered and unfunded.
    pub fn new(
        config: GovernanceConfig,
        fees: &FeeConfig,
        first_airline: Account,
        first_name: impl Into<String>,
    ) -> Self {
        let mut seed = Airline::candidate(first_airline.clone(), first_name.into());
        seed.registered = true;

        let mut airlines = BTreeMap::new();
        airlines.insert(first_airline, seed);
        Self {
            config,
            airline_fee: fees.airline_fee,
            airlines,
        }
    }

    /// Pay the participation fee.
    pub fn fund(&mut self, caller: &Account, fee_paid: Amount) -> Result<FundOutcome> {
        let airline_fee = self.airline_fee;
        let airline = self
            .airlines
            .get_mut(caller)
            .filter(|a| a.registered)
            .ok_or_else(|| SuretyError::AirlineNotRegistered(caller.clone()))?;

        if airline.funded {
            debug!(airline = %caller, "Airline already funded");
            return Ok(FundOutcome::AlreadyFunded);
        }
        if fee_paid < airline_fee {
            return Err(SuretyError::InsufficientFee {
                required: airline_fee,
                paid: fee_paid,
            });
        }

        airline.funded = true;
        info!(airline = %caller, fee = %fee_paid, "Airline funded");
        Ok(FundOutcome::Funded)
    }

    /// Register `candidate`, directly or by vote.
    ///
    /// The operating gate is checked by the engine.
    pub fn register(&mut self, candidate: &Account, name: &str, caller: &Account) -> Result<Admission> {
        if !self.is_funded(caller) {
            return Err(SuretyError::CallerNotFunded(caller.clone()));
        }
        if self.is_registered(candidate) {
            debug!(candidate = %candidate, "Candidate already registered");
            return Ok(Admission::AlreadyRegistered);
        }

        let registered = self.registered_count();
        let record = self
            .airlines
            .entry(candidate.clone())
            .or_insert_with(|| Airline::candidate(candidate.clone(), name.to_string()));

        if registered < self.config.bootstrap_size {
            record.registered = true;
            record.name = name.to_string();
            record.votes.clear();
            info!(
                candidate = %candidate,
                name = %name,
                sponsor = %caller,
                "Airline admitted directly"
            );
            return Ok(Admission::Direct);
        }

        let required = registered.div_ceil(2);
        let fresh = record.votes.insert(caller.clone());
        let votes = record.votes.len();

        if !fresh {
            debug!(candidate = %candidate, voter = %caller, "Duplicate admission vote ignored");
            return Ok(Admission::DuplicateVote { votes, required });
        }

        if votes >= required {
            record.registered = true;
            record.votes.clear();
            info!(
                candidate = %candidate,
                votes = votes,
                required = required,
                "Airline admitted by vote"
            );
            return Ok(Admission::Elected { votes, required });
        }

        info!(
            candidate = %candidate,
            voter = %caller,
            votes = votes,
            required = required,
            "Admission vote recorded"
        );
        Ok(Admission::VoteRecorded { votes, required })
    }

    pub fn is_funded(&self, id: &Account) -> bool {
        self.airlines.get(id).map(|a| a.funded).unwrap_or(false)
    }

    pub fn is_registered(&self, id: &Account) -> bool {
        self.airlines.get(id).map(|a| a.registered).unwrap_or(false)
    }

    /// Number of registered airlines.
    pub fn registered_count(&self) -> usize {
        self.airlines.values().filter(|a| a.registered).count()
    }

    /// Pending votes for an unregistered candidate.
    pub fn votes_for(&self, candidate: &Account) -> usize {
        self.airlines
            .get(candidate)
            .filter(|a| !a.registered)
            .map(|a| a.votes.len())
            .unwrap_or(0)
    }

    pub fn airline(&self, id: &Account) -> Option<&Airline> {
        self.airlines.get(id)
    }

    pub fn airlines(&self) -> Vec<Airline> {
        self.airlines.values().cloned().collect()
    }

    pub(crate) fn restore(&mut self, airlines: Vec<Airline>) {
        self.airlines = airlines.into_iter().map(|a| (a.id.clone(), a)).collect();
    }
}
