//! Shared async handle over a [`SuretyEngine`].
//!
//! Callers on many tasks share one engine behind a tokio `RwLock`, which
//! serializes every mutation. After each mutating call the queued engine
//! events are published on a broadcast channel; oracle workers subscribe to it
//! to learn about new status requests.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use crate::coordinator::{RequestStatus, RequestTicket, ResponseOutcome};
use crate::engine::SuretyEngine;
use crate::events::RecordedEvent;
use crate::flight::Flight;
use crate::governance::{Admission, FundOutcome};
use crate::insurance::InsurancePolicy;
use crate::snapshot::EngineSnapshot;
use crate::types::{Account, Amount, FlightKey, Result, StatusCode};

/// Buffered events per subscriber before it starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Cloneable async facade over the engine.
#[derive(Clone)]
pub struct SuretyService {
    engine: Arc<RwLock<SuretyEngine>>,
    events_tx: broadcast::Sender<RecordedEvent>,
}

impl SuretyService {
    pub fn new(engine: SuretyEngine) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            engine: Arc::new(RwLock::new(engine)),
            events_tx,
        }
    }

    /// Receive every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<RecordedEvent> {
        self.events_tx.subscribe()
    }

    /// Run a mutation under the write lock, then publish what it emitted.
    async fn mutate<T>(&self, op: impl FnOnce(&mut SuretyEngine) -> Result<T>) -> Result<T> {
        let (result, events) = {
            let mut engine = self.engine.write().await;
            let result = op(&mut *engine);
            (result, engine.drain_events())
        };

        for event in events {
            let sequence = event.sequence;
            if self.events_tx.send(event).is_err() {
                debug!(sequence = sequence, "No event subscribers");
            }
        }
        if let Err(e) = &result {
            if e.is_retry_safe() {
                debug!(error = %e, "Request was a no-op");
            } else {
                warn!(error = %e, "Request rejected");
            }
        }
        result
    }

    /// Read-only access under the read lock.
    pub async fn read<T>(&self, op: impl FnOnce(&SuretyEngine) -> T) -> T {
        let engine = self.engine.read().await;
        op(&*engine)
    }

    pub async fn set_operating_status(&self, caller: &Account, operational: bool) -> Result<()> {
        self.mutate(|e| e.set_operating_status(caller, operational)).await
    }

    pub async fn authorize_caller(&self, caller: &Account, account: Account) -> Result<()> {
        self.mutate(|e| e.authorize_caller(caller, account)).await
    }

    pub async fn deauthorize_caller(&self, caller: &Account, account: &Account) -> Result<()> {
        self.mutate(|e| e.deauthorize_caller(caller, account)).await
    }

    pub async fn register_oracle(&self, caller: &Account, fee_paid: Amount) -> Result<Vec<u8>> {
        self.mutate(|e| e.register_oracle(caller, fee_paid)).await
    }

    pub async fn get_oracle_indexes(&self, caller: &Account) -> Result<Vec<u8>> {
        self.read(|e| e.get_oracle_indexes(caller)).await
    }

    pub async fn fund_airline(&self, caller: &Account, fee_paid: Amount) -> Result<FundOutcome> {
        self.mutate(|e| e.fund_airline(caller, fee_paid)).await
    }

    pub async fn register_airline(&self, caller: &Account, candidate: &Account, name: &str) -> Result<Admission> {
        self.mutate(|e| e.register_airline(caller, candidate, name)).await
    }

    pub async fn register_flight(&self, caller: &Account, flight: &str, timestamp: i64) -> Result<FlightKey> {
        self.mutate(|e| e.register_flight(caller, flight, timestamp)).await
    }

    pub async fn flights(&self) -> Vec<Flight> {
        self.read(|e| e.flights()).await
    }

    pub async fn fetch_flight_status(
        &self,
        caller: &Account,
        airline: &Account,
        flight: &str,
        timestamp: i64,
    ) -> Result<RequestTicket> {
        self.mutate(|e| e.fetch_flight_status(caller, airline, flight, timestamp))
            .await
    }

    pub async fn submit_oracle_response(
        &self,
        oracle: &Account,
        index: u8,
        key: &FlightKey,
        status: StatusCode,
    ) -> Result<ResponseOutcome> {
        self.mutate(|e| e.submit_oracle_response(oracle, index, key, status))
            .await
    }

    pub async fn get_request_status(&self, key: &FlightKey) -> Result<RequestStatus> {
        self.read(|e| e.get_request_status(key)).await
    }

    pub async fn archive_resolved_requests(&self, caller: &Account) -> Result<usize> {
        self.mutate(|e| e.archive_resolved_requests(caller)).await
    }

    pub async fn buy_insurance(
        &self,
        passenger: &Account,
        airline: &Account,
        flight: &str,
        premium: Amount,
    ) -> Result<InsurancePolicy> {
        self.mutate(|e| e.buy_insurance(passenger, passenger, airline, flight, premium))
            .await
    }

    pub async fn withdraw(&self, caller: &Account, amount: Amount) -> Result<Amount> {
        self.mutate(|e| e.withdraw(caller, amount)).await
    }

    pub async fn get_balance(&self, account: &Account) -> Amount {
        self.read(|e| e.get_balance(account)).await
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        self.read(|e| e.snapshot()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SuretyEvent;
    use crate::types::{SuretyError, ETHER};

    fn service() -> SuretyService {
        let engine = SuretyEngine::builder("owner")
            .first_airline("AA", "American")
            .build()
            .unwrap();
        SuretyService::new(engine)
    }

    #[tokio::test]
    async fn test_events_published_after_mutation() {
        let service = service();
        let mut rx = service.subscribe();
        let airline = Account::new("AA");

        service.fund_airline(&airline, 10 * ETHER).await.unwrap();
        let ticket = service
            .fetch_flight_status(&Account::new("client"), &airline, "ND1309", 1_700_000_000)
            .await
            .unwrap();

        let funded = rx.recv().await.unwrap();
        assert!(matches!(funded.event, SuretyEvent::AirlineFunded { .. }));
        let request = rx.recv().await.unwrap();
        assert_eq!(
            request.event,
            SuretyEvent::OracleRequest {
                index: ticket.routing_index,
                flight: ticket.key.clone(),
            }
        );
        assert!(request.sequence > funded.sequence);
    }

    #[tokio::test]
    async fn test_rejected_call_publishes_nothing() {
        let service = service();
        let mut rx = service.subscribe();
        let err = service
            .register_flight(&Account::new("AA"), "ND1309", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, SuretyError::CallerNotFunded(_)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_engine() {
        let service = service();
        let mut handles = Vec::new();
        for i in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .register_oracle(&Account::new(format!("oracle-{}", i)), ETHER)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let count = service.read(|e| e.oracles().oracle_count()).await;
        assert_eq!(count, 8);
        assert_eq!(service.read(|e| e.escrow().oracle_fees).await, 8 * ETHER);
    }

    #[test]
    fn test_operating_gate_through_service() {
        let service = service();
        tokio_test::block_on(async {
            let owner = Account::new("owner");
            assert!(matches!(
                service.set_operating_status(&Account::new("AA"), false).await,
                Err(SuretyError::NotOwner(_))
            ));
            service.set_operating_status(&owner, false).await.unwrap();
            assert!(matches!(
                service.withdraw(&Account::new("AA"), 0).await,
                Err(SuretyError::NotOperational)
            ));
            assert!(!service.read(|e| e.is_operational()).await);
        });
    }
}
