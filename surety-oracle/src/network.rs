//! A pool of simulated oracle workers answering status requests.
//!
//! Each worker registers once through the [`SuretyService`], keeps the indexes
//! it was assigned, and answers every `OracleRequest` event routed to one of
//! them with the status its provider reports.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use flight_surety::coordinator::ResponseOutcome;
use flight_surety::{Account, Amount, FlightKey, SuretyError, SuretyEvent, SuretyService, ETHER};

use crate::error::{OracleNetworkError, Result};
use crate::provider::StatusProvider;

/// Size and funding of a simulated network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Workers to register
    pub oracle_count: usize,
    /// Fee each worker pays at registration
    pub registration_fee: Amount,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            oracle_count: 20,
            registration_fee: ETHER,
        }
    }
}

/// One registered oracle.
#[derive(Clone)]
pub struct OracleWorker {
    pub account: Account,
    pub indexes: Vec<u8>,
    provider: Arc<dyn StatusProvider>,
}

impl OracleWorker {
    pub fn serves(&self, index: u8) -> bool {
        self.indexes.contains(&index)
    }
}

/// Registered workers plus the service they report to.
pub struct OracleNetwork {
    service: SuretyService,
    workers: Vec<OracleWorker>,
}

impl OracleNetwork {
    /// Register `config.oracle_count` workers with random addresses.
    pub async fn register(
        service: SuretyService,
        config: &NetworkConfig,
        provider: Arc<dyn StatusProvider>,
    ) -> Result<Self> {
        let accounts: Vec<Account> = {
            let mut rng = rand::thread_rng();
            (0..config.oracle_count)
                .map(|_| Account::from_address(&rng.gen::<[u8; 20]>()))
                .collect()
        };
        Self::register_accounts(service, accounts, config.registration_fee, provider).await
    }

    /// Register the given accounts as workers sharing one provider.
    pub async fn register_accounts(
        service: SuretyService,
        accounts: Vec<Account>,
        registration_fee: Amount,
        provider: Arc<dyn StatusProvider>,
    ) -> Result<Self> {
        let mut workers = Vec::with_capacity(accounts.len());
        for account in accounts {
            let indexes = service
                .register_oracle(&account, registration_fee)
                .await
                .map_err(|source| OracleNetworkError::Registration {
                    oracle: account.clone(),
                    source,
                })?;
            debug!(oracle = %account, indexes = ?indexes, "Oracle worker registered");
            workers.push(OracleWorker {
                account,
                indexes,
                provider: provider.clone(),
            });
        }

        info!(
            workers = workers.len(),
            provider = provider.id(),
            "Oracle network registered"
        );
        Ok(Self { service, workers })
    }

    pub fn workers(&self) -> &[OracleWorker] {
        &self.workers
    }

    /// Workers holding `index`.
    pub fn workers_for(&self, index: u8) -> impl Iterator<Item = &OracleWorker> {
        self.workers.iter().filter(move |w| w.serves(index))
    }

    /// Have every worker holding `index` answer the request for `flight`.
    ///
    /// Stops once the request resolves. Rejections are logged, not returned.
    pub async fn answer(&self, index: u8, flight: &FlightKey) -> Vec<ResponseOutcome> {
        let mut outcomes = Vec::new();
        for worker in self.workers_for(index) {
            let status = worker.provider.status_for(flight).await;
            match self
                .service
                .submit_oracle_response(&worker.account, index, flight, status)
                .await
            {
                Ok(outcome) => {
                    outcomes.push(outcome);
                    if let ResponseOutcome::Resolved { status } = outcome {
                        info!(flight = %flight, status = %status, "Oracle network reached quorum");
                        break;
                    }
                }
                Err(SuretyError::UnknownRequest(_)) => {
                    debug!(flight = %flight, "Request closed before all workers answered");
                    break;
                }
                Err(e) => {
                    warn!(oracle = %worker.account, error = %e, "Oracle response rejected");
                }
            }
        }
        if outcomes.is_empty() {
            debug!(index = index, flight = %flight, "No worker answered");
        }
        outcomes
    }

    /// Answer routed requests in a background task until shut down.
    pub fn spawn(self) -> NetworkHandle {
        let mut events = self.service.subscribe();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!("Oracle network shutting down");
                        break;
                    }
                    received = events.recv() => match received {
                        Ok(recorded) => {
                            if let SuretyEvent::OracleRequest { index, flight } = recorded.event {
                                self.answer(index, &flight).await;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped = skipped, "Oracle network lagged behind engine events");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            self
        });

        NetworkHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Running network task.
pub struct NetworkHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<OracleNetwork>,
}

impl NetworkHandle {
    /// Stop the task and get the network back.
    pub async fn shutdown(self) -> Result<OracleNetwork> {
        // The task may already have exited on a closed channel.
        let _ = self.shutdown.send(());
        self.task
            .await
            .map_err(|e| OracleNetworkError::Task(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FixedStatusProvider;
    use flight_surety::seed::routing_index;
    use flight_surety::{StatusCode, SuretyEngine};

    fn departure() -> FlightKey {
        FlightKey::new("AA", "ND1309", 1_700_000_000)
    }

    fn service() -> SuretyService {
        let r = routing_index(&departure(), 10);
        let seed = move |_: &Account, _: u64| {
            let mut seed = [0u8; 32];
            seed[..3].copy_from_slice(&[r, (r + 3) % 10, (r + 6) % 10]);
            seed
        };
        let engine = SuretyEngine::builder("owner")
            .first_airline("AA", "American")
            .seed_source(seed)
            .build()
            .unwrap();
        SuretyService::new(engine)
    }

    #[tokio::test]
    async fn test_register_assigns_random_accounts() {
        let config = NetworkConfig {
            oracle_count: 4,
            registration_fee: ETHER,
        };
        let network = OracleNetwork::register(service(), &config, Arc::new(FixedStatusProvider::default()))
            .await
            .unwrap();
        assert_eq!(network.workers().len(), 4);
        assert!(network.workers().iter().all(|w| w.account.as_str().starts_with("0x")));
    }

    #[tokio::test]
    async fn test_underpaid_registration_fails() {
        let err = OracleNetwork::register_accounts(
            service(),
            vec![Account::new("cheap")],
            ETHER - 1,
            Arc::new(FixedStatusProvider::default()),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(
            err,
            OracleNetworkError::Registration {
                source: SuretyError::InsufficientFee { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_answer_stops_at_quorum() {
        let service = service();
        let provider = Arc::new(FixedStatusProvider::new(StatusCode::LateAirline));
        let accounts = (0..5).map(|i| Account::new(format!("o{}", i))).collect();
        let network = OracleNetwork::register_accounts(service.clone(), accounts, ETHER, provider.clone())
            .await
            .unwrap();

        let key = departure();
        let ticket = service
            .fetch_flight_status(&Account::new("client"), &key.airline, &key.flight, key.timestamp)
            .await
            .unwrap();
        let outcomes = network.answer(ticket.routing_index, &key).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(
            outcomes.last(),
            Some(&ResponseOutcome::Resolved {
                status: StatusCode::LateAirline
            })
        );
        assert_eq!(provider.call_count(), 3);
    }
}
