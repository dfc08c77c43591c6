//! Where oracle workers get the status they report.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use flight_surety::{FlightKey, StatusCode};

/// Source of flight outcomes for an oracle worker.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    /// Provider identifier, used in logs.
    fn id(&self) -> &str;

    /// Status to report for a departure.
    async fn status_for(&self, flight: &FlightKey) -> StatusCode;
}

/// Which reference provider to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Always answer the same code
    Fixed(StatusCode),
    /// Uniform over the six codes
    Random,
}

impl ProviderKind {
    pub fn build(self) -> Arc<dyn StatusProvider> {
        match self {
            ProviderKind::Fixed(status) => Arc::new(FixedStatusProvider::new(status)),
            ProviderKind::Random => Arc::new(RandomStatusProvider::new()),
        }
    }
}

/// Answers every request with one status.
pub struct FixedStatusProvider {
    status: StatusCode,
    call_count: AtomicU32,
}

impl FixedStatusProvider {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            call_count: AtomicU32::new(0),
        }
    }

    /// Number of statuses handed out.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for FixedStatusProvider {
    fn default() -> Self {
        Self::new(StatusCode::LateAirline)
    }
}

#[async_trait]
impl StatusProvider for FixedStatusProvider {
    fn id(&self) -> &str {
        "fixed"
    }

    async fn status_for(&self, _flight: &FlightKey) -> StatusCode {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.status
    }
}

/// Picks uniformly among [`StatusCode::ALL`].
pub struct RandomStatusProvider {
    rng: Mutex<StdRng>,
}

impl RandomStatusProvider {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible sequence for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomStatusProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusProvider for RandomStatusProvider {
    fn id(&self) -> &str {
        "random"
    }

    async fn status_for(&self, _flight: &FlightKey) -> StatusCode {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        StatusCode::ALL
            .choose(&mut *rng)
            .copied()
            .unwrap_or(StatusCode::Unknown)
    }
}
