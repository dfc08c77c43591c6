//! The surety engine: a sequential state machine over all components.
//!
//! Every public operation takes `&mut self` and is applied atomically: a
//! failed call leaves every table unchanged. The engine consults the operating
//! gate before each state-mutating operation, wires quorum resolution into the
//! insurance ledger and flight registry, and queues domain events for
//! [`drain_events`](SuretyEngine::drain_events).

use chrono::Utc;
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::config::SuretyConfig;
use crate::coordinator::{
    FlightStatusCoordinator, OpenOutcome, RequestStatus, RequestTicket, ResponseOutcome,
};
use crate::escrow::{Escrow, EscrowSource};
use crate::events::{RecordedEvent, SuretyEvent};
use crate::flight::{Flight, FlightRegistry};
use crate::governance::{Admission, AirlineGovernance, FundOutcome};
use crate::identity::IdentityLedger;
use crate::insurance::{InsuranceLedger, InsurancePolicy, PayoutSink, RecordingSink};
use crate::oracle::OracleRegistry;
use crate::seed::{ClockNonce, SeedSource, SubstrateSeed};
use crate::snapshot::{EngineSnapshot, SNAPSHOT_VERSION};
use crate::types::{Account, Amount, FlightKey, Result, StatusCode, SuretyError};

/// Queued events kept before the oldest are dropped.
const MAX_PENDING_EVENTS: usize = 10_000;

/// Builder for [`SuretyEngine`].
pub struct SuretyEngineBuilder {
    owner: Account,
    first_airline: Option<(Account, String)>,
    config: SuretyConfig,
    seeds: Option<Box<dyn SeedSource>>,
    sink: Option<Box<dyn PayoutSink>>,
    snapshot: Option<EngineSnapshot>,
}

impl SuretyEngineBuilder {
    /// Seed the bootstrap airline (registered, unfunded).
    pub fn first_airline(mut self, id: impl Into<Account>, name: impl Into<String>) -> Self {
        self.first_airline = Some((id.into(), name.into()));
        self
    }

    pub fn config(mut self, config: SuretyConfig) -> Self {
        self.config = config;
        self
    }

    /// Inject the seed source used for oracle index assignment.
    pub fn seed_source(mut self, seeds: impl SeedSource + 'static) -> Self {
        self.seeds = Some(Box::new(seeds));
        self
    }

    /// Inject the external transfer effect used by withdrawals.
    pub fn payout_sink(mut self, sink: impl PayoutSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Start from a persisted snapshot instead of an empty federation.
    pub fn restore(mut self, snapshot: EngineSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn build(self) -> Result<SuretyEngine> {
        self.config.validate()?;
        let config = self.config;

        let seeds: Box<dyn SeedSource> = match self.seeds {
            Some(seeds) => seeds,
            None => Box::new(SubstrateSeed::<ClockNonce>::default()),
        };
        let sink: Box<dyn PayoutSink> = match self.sink {
            Some(sink) => sink,
            None => Box::new(RecordingSink::new()),
        };

        let (first_id, first_name) = match (&self.first_airline, &self.snapshot) {
            (Some((id, name)), _) => (id.clone(), name.clone()),
            (None, Some(_)) => (self.owner.clone(), String::new()),
            (None, None) => {
                return Err(SuretyError::Config(
                    "a first airline or a snapshot is required".to_string(),
                ))
            }
        };

        let mut engine = SuretyEngine {
            identity: IdentityLedger::new(self.owner.clone()),
            oracles: OracleRegistry::with_seed_source(config.oracles.clone(), &config.fees, seeds),
            flights: FlightRegistry::new(),
            coordinator: FlightStatusCoordinator::new(config.oracles.clone()),
            governance: AirlineGovernance::new(
                config.governance.clone(),
                &config.fees,
                first_id,
                first_name,
            ),
            insurance: InsuranceLedger::new(&config.fees, config.payout.clone()),
            sink,
            events: VecDeque::new(),
            sequence: 0,
            config,
        };

        if let Some(snapshot) = self.snapshot {
            if snapshot.version != SNAPSHOT_VERSION {
                return Err(SuretyError::Config(format!(
                    "unsupported snapshot version {}",
                    snapshot.version
                )));
            }
            if snapshot.identity.owner() != &self.owner {
                return Err(SuretyError::Config(format!(
                    "snapshot owned by {}, not {}",
                    snapshot.identity.owner(),
                    self.owner
                )));
            }
            if snapshot.config != engine.config {
                return Err(SuretyError::Config(
                    "snapshot was taken under a different configuration".to_string(),
                ));
            }
            engine.apply_snapshot(snapshot);
        }

        info!(
            owner = %engine.identity.owner(),
            airlines = engine.governance.registered_count(),
            "Surety engine ready"
        );
        Ok(engine)
    }
}

/// Sequential state machine owning every component.
pub struct SuretyEngine {
    config: SuretyConfig,
    identity: IdentityLedger,
    oracles: OracleRegistry,
    flights: FlightRegistry,
    coordinator: FlightStatusCoordinator,
    governance: AirlineGovernance,
    insurance: InsuranceLedger,
    sink: Box<dyn PayoutSink>,
    events: VecDeque<RecordedEvent>,
    sequence: u64,
}

impl SuretyEngine {
    /// Start building an engine owned by `owner`.
    pub fn builder(owner: impl Into<Account>) -> SuretyEngineBuilder {
        SuretyEngineBuilder {
            owner: owner.into(),
            first_airline: None,
            config: SuretyConfig::default(),
            seeds: None,
            sink: None,
            snapshot: None,
        }
    }

    fn emit(&mut self, event: SuretyEvent) {
        self.sequence += 1;
        self.events.push_back(RecordedEvent {
            sequence: self.sequence,
            recorded_at: Utc::now(),
            event,
        });
        while self.events.len() > MAX_PENDING_EVENTS {
            self.events.pop_front();
        }
    }

    /// Take every queued event, oldest first.
    pub fn drain_events(&mut self) -> Vec<RecordedEvent> {
        self.events.drain(..).collect()
    }

    // ====================================================================
    // Identity and the operating gate
    // ====================================================================

    /// Flip the operating gate. Owner only.
    pub fn set_operating_status(&mut self, caller: &Account, operational: bool) -> Result<()> {
        let changed = self.identity.is_operational() != operational;
        self.identity.set_operating_status(caller, operational)?;
        if changed {
            self.emit(SuretyEvent::OperatingStatusChanged { operational });
        }
        Ok(())
    }

    pub fn authorize_caller(&mut self, caller: &Account, account: Account) -> Result<()> {
        self.identity.authorize_caller(caller, account)
    }

    pub fn deauthorize_caller(&mut self, caller: &Account, account: &Account) -> Result<()> {
        self.identity.deauthorize_caller(caller, account)
    }

    pub fn is_operational(&self) -> bool {
        self.identity.is_operational()
    }

    // ====================================================================
    // Oracles
    // ====================================================================

    /// Register `caller` as an oracle; the fee goes into escrow.
    pub fn register_oracle(&mut self, caller: &Account, fee_paid: Amount) -> Result<Vec<u8>> {
        self.identity.require_operational()?;
        self.insurance
            .escrow()
            .check_deposit(EscrowSource::OracleRegistration, fee_paid)?;

        let indexes = self.oracles.register(caller, fee_paid)?;
        self.insurance
            .escrow_mut()
            .deposit(EscrowSource::OracleRegistration, fee_paid)?;

        self.emit(SuretyEvent::OracleRegistered {
            oracle: caller.clone(),
            indexes: indexes.clone(),
        });
        Ok(indexes)
    }

    pub fn get_oracle_indexes(&self, caller: &Account) -> Result<Vec<u8>> {
        self.oracles.get_indexes(caller)
    }

    // ====================================================================
    // Airlines and flights
    // ====================================================================

    /// Pay the airline participation fee.
    pub fn fund_airline(&mut self, caller: &Account, fee_paid: Amount) -> Result<FundOutcome> {
        self.identity.require_operational()?;
        self.insurance
            .escrow()
            .check_deposit(EscrowSource::AirlineFunding, fee_paid)?;

        let outcome = self.governance.fund(caller, fee_paid)?;
        if outcome == FundOutcome::Funded {
            self.insurance
                .escrow_mut()
                .deposit(EscrowSource::AirlineFunding, fee_paid)?;
            self.emit(SuretyEvent::AirlineFunded {
                airline: caller.clone(),
                fee: fee_paid,
            });
        }
        Ok(outcome)
    }

    /// Register a candidate airline, directly or by vote.
    pub fn register_airline(&mut self, caller: &Account, candidate: &Account, name: &str) -> Result<Admission> {
        self.identity.require_operational()?;
        let admission = self.governance.register(candidate, name, caller)?;

        match admission {
            Admission::Direct | Admission::Elected { .. } => {
                if let Admission::Elected { votes, required } = admission {
                    self.emit(SuretyEvent::AirlineVoted {
                        candidate: candidate.clone(),
                        voter: caller.clone(),
                        votes,
                        required,
                    });
                }
                self.emit(SuretyEvent::AirlineRegistered {
                    airline: candidate.clone(),
                    name: name.to_string(),
                });
            }
            Admission::VoteRecorded { votes, required } => {
                self.emit(SuretyEvent::AirlineVoted {
                    candidate: candidate.clone(),
                    voter: caller.clone(),
                    votes,
                    required,
                });
            }
            Admission::DuplicateVote { .. } | Admission::AlreadyRegistered => {}
        }
        Ok(admission)
    }

    pub fn is_airline_registered(&self, id: &Account) -> bool {
        self.governance.is_registered(id)
    }

    pub fn is_airline_funded(&self, id: &Account) -> bool {
        self.governance.is_funded(id)
    }

    /// Register a flight operated by the calling airline.
    pub fn register_flight(&mut self, caller: &Account, flight: &str, timestamp: i64) -> Result<FlightKey> {
        self.identity.require_operational()?;
        if !self.governance.is_funded(caller) {
            return Err(SuretyError::CallerNotFunded(caller.clone()));
        }
        let key = self.flights.register_flight(caller, flight, timestamp)?;
        self.emit(SuretyEvent::FlightRegistered { flight: key.clone() });
        Ok(key)
    }

    pub fn flight(&self, airline: &Account, flight: &str) -> Option<&Flight> {
        self.flights.flight(airline, flight)
    }

    /// Every registered flight.
    pub fn flights(&self) -> Vec<Flight> {
        self.flights.flights()
    }

    // ====================================================================
    // Status requests
    // ====================================================================

    /// Open a status request for a departure.
    pub fn fetch_flight_status(
        &mut self,
        caller: &Account,
        airline: &Account,
        flight: &str,
        timestamp: i64,
    ) -> Result<RequestTicket> {
        self.identity.require_operational()?;
        let key = FlightKey::new(airline.clone(), flight, timestamp);
        let ticket = self.coordinator.open_request(key, caller);
        if ticket.outcome == OpenOutcome::Opened {
            self.emit(SuretyEvent::OracleRequest {
                index: ticket.routing_index,
                flight: ticket.key.clone(),
            });
        }
        Ok(ticket)
    }

    /// Accept an oracle response; settles insurance when quorum is reached.
    pub fn submit_oracle_response(
        &mut self,
        oracle: &Account,
        index: u8,
        key: &FlightKey,
        status: StatusCode,
    ) -> Result<ResponseOutcome> {
        self.identity.require_operational()?;
        let account = self
            .oracles
            .oracle(oracle)
            .ok_or_else(|| SuretyError::NotRegistered(oracle.clone()))?;

        if self.coordinator.check_response(index, key, status, account)? {
            self.insurance.check_settlement(key, status)?;
        }
        let outcome = self.coordinator.submit_response(index, key, status, account)?;
        self.emit(SuretyEvent::OracleReport {
            oracle: oracle.clone(),
            flight: key.clone(),
            status,
        });

        if let ResponseOutcome::Resolved { status } = outcome {
            self.resolve(key, status)?;
        }
        Ok(outcome)
    }

    fn resolve(&mut self, key: &FlightKey, status: StatusCode) -> Result<()> {
        let credits = self.insurance.on_status_resolved(key, status)?;
        if !self.flights.record_status(key, status) {
            debug!(flight = %key, "Resolved request has no matching registered departure");
        }

        self.emit(SuretyEvent::FlightStatusInfo {
            flight: key.clone(),
            status,
        });
        for credit in credits {
            self.emit(SuretyEvent::PayoutCredited {
                policy_id: credit.policy_id,
                passenger: credit.passenger,
                amount: credit.amount,
            });
        }
        Ok(())
    }

    pub fn get_request_status(&self, key: &FlightKey) -> Result<RequestStatus> {
        self.coordinator.get_request_status(key)
    }

    /// Routing index of the latest request for a flight.
    pub fn last_request_index(&self, airline: &Account, flight: &str) -> Option<u8> {
        self.coordinator.last_request_index(airline, flight)
    }

    /// Departures still collecting responses.
    pub fn open_requests(&self) -> Vec<FlightKey> {
        self.coordinator.open_requests()
    }

    /// Compact resolved requests. Authorized callers only.
    pub fn archive_resolved_requests(&mut self, caller: &Account) -> Result<usize> {
        self.identity.require_authorized(caller)?;
        Ok(self.coordinator.archive_resolved())
    }

    // ====================================================================
    // Insurance
    // ====================================================================

    /// Buy a policy for `passenger` on a registered flight.
    pub fn buy_insurance(
        &mut self,
        caller: &Account,
        passenger: &Account,
        airline: &Account,
        flight: &str,
        premium: Amount,
    ) -> Result<InsurancePolicy> {
        self.identity.require_operational()?;
        self.insurance.check_premium(premium)?;

        let registered = self.flights.require_flight(airline, flight)?;
        if registered.resolved {
            return Err(SuretyError::FlightAlreadyResolved(registered.key()));
        }
        let key = registered.key();

        let policy = self.insurance.buy(passenger, key, premium)?;
        debug!(policy_id = policy.id, buyer = %caller, "Policy paid for");
        self.emit(SuretyEvent::InsurancePurchased {
            policy_id: policy.id,
            passenger: passenger.clone(),
            flight: policy.flight.clone(),
            premium,
        });
        Ok(policy)
    }

    /// Withdraw from the caller's balance through the payout sink.
    pub fn withdraw(&mut self, caller: &Account, amount: Amount) -> Result<Amount> {
        self.identity.require_operational()?;
        let remaining = self.insurance.withdraw(caller, amount, self.sink.as_mut())?;
        self.emit(SuretyEvent::Withdrawn {
            account: caller.clone(),
            amount,
        });
        Ok(remaining)
    }

    pub fn get_balance(&self, account: &Account) -> Amount {
        self.insurance.get_balance(account)
    }

    pub fn policies_for(&self, passenger: &Account) -> Vec<InsurancePolicy> {
        self.insurance.policies_for(passenger)
    }

    pub fn escrow(&self) -> &Escrow {
        self.insurance.escrow()
    }

    // ====================================================================
    // Component access
    // ====================================================================

    pub fn config(&self) -> &SuretyConfig {
        &self.config
    }

    pub fn identity(&self) -> &IdentityLedger {
        &self.identity
    }

    pub fn governance(&self) -> &AirlineGovernance {
        &self.governance
    }

    pub fn oracles(&self) -> &OracleRegistry {
        &self.oracles
    }

    pub fn coordinator(&self) -> &FlightStatusCoordinator {
        &self.coordinator
    }

    pub fn insurance(&self) -> &InsuranceLedger {
        &self.insurance
    }

    // ====================================================================
    // Persistence
    // ====================================================================

    /// Capture every table.
    pub fn snapshot(&self) -> EngineSnapshot {
        let (requests, archived_requests, last_request_indexes) = self.coordinator.tables();
        let (policies, balances) = self.insurance.tables();
        EngineSnapshot {
            version: SNAPSHOT_VERSION,
            taken_at: Utc::now(),
            config: self.config.clone(),
            identity: self.identity.clone(),
            airlines: self.governance.airlines(),
            oracles: self.oracles.accounts().cloned().collect(),
            oracle_counter: self.oracles.counter(),
            flights: self.flights.flights(),
            requests,
            archived_requests,
            last_request_indexes,
            policies,
            balances,
            escrow: self.insurance.escrow().clone(),
        }
    }

    fn apply_snapshot(&mut self, snapshot: EngineSnapshot) {
        info!(
            airlines = snapshot.airlines.len(),
            oracles = snapshot.oracles.len(),
            requests = snapshot.requests.len(),
            policies = snapshot.policies.len(),
            "Restoring engine from snapshot"
        );
        self.identity = snapshot.identity;
        self.governance.restore(snapshot.airlines);
        self.oracles.restore(snapshot.oracles, snapshot.oracle_counter);
        self.flights.restore(snapshot.flights);
        self.coordinator
            .restore(snapshot.requests, snapshot.archived_requests, snapshot.last_request_indexes);
        self.insurance
            .restore(snapshot.policies, snapshot.balances, snapshot.escrow);
    }
}
