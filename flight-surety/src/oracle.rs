//! Oracle registry.
//!
//! Oracles pay a registration fee and receive a fixed set of routing indexes.
//! A status request is only answered by oracles holding its routing index.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::config::{FeeConfig, OracleConfig};
use crate::seed::{draw_indexes, ClockNonce, SeedSource, SubstrateSeed};
use crate::types::{Account, Amount, Result, SuretyError};

/// The rotating counter mixed into each seed wraps after this value.
const COUNTER_ROTATION: u64 = 250;

/// A registered oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleAccount {
    /// Oracle account
    pub id: Account,
    /// Assigned routing indexes, distinct, fixed once assigned
    pub indexes: Vec<u8>,
    /// Always true once stored
    pub registered: bool,
}

impl OracleAccount {
    /// Whether this oracle serves `index`.
    pub fn serves(&self, index: u8) -> bool {
        self.indexes.contains(&index)
    }
}

/// Registers oracles and assigns their routing indexes.
pub struct OracleRegistry {
    config: OracleConfig,
    registration_fee: Amount,
    oracles: HashMap<Account, OracleAccount>,
    seeds: Box<dyn SeedSource>,
    counter: u64,
}

impl OracleRegistry {
    /// Create a registry seeded from the wall clock.
    pub fn new(config: OracleConfig, fees: &FeeConfig) -> Self {
        Self::with_seed_source(config, fees, Box::new(SubstrateSeed::<ClockNonce>::default()))
    }

    /// Create a registry with an injected seed source.
    pub fn with_seed_source(
        config: OracleConfig,
        fees: &FeeConfig,
        seeds: Box<dyn SeedSource>,
    ) -> Self {
        Self {
            config,
            registration_fee: fees.registration_fee,
            oracles: HashMap::new(),
            seeds,
            counter: 0,
        }
    }

    /// Register `caller` as an oracle and return its indexes.
    pub fn register(&mut self, caller: &Account, fee_paid: Amount) -> Result<Vec<u8>> {
        if fee_paid < self.registration_fee {
            return Err(SuretyError::InsufficientFee {
                required: self.registration_fee,
                paid: fee_paid,
            });
        }
        if self.oracles.contains_key(caller) {
            return Err(SuretyError::AlreadyRegistered(caller.clone()));
        }

        let seed = self.seeds.seed(caller, self.counter);
        self.counter = (self.counter + 1) % COUNTER_ROTATION;
        let indexes = draw_indexes(
            seed,
            self.config.index_space,
            self.config.indexes_per_oracle as usize,
        );

        info!(oracle = %caller, indexes = ?indexes, "Oracle registered");

        self.oracles.insert(
            caller.clone(),
            OracleAccount {
                id: caller.clone(),
                indexes: indexes.clone(),
                registered: true,
            },
        );
        Ok(indexes)
    }

    /// Indexes assigned to `caller`.
    pub fn get_indexes(&self, caller: &Account) -> Result<Vec<u8>> {
        self.oracles
            .get(caller)
            .map(|o| o.indexes.clone())
            .ok_or_else(|| SuretyError::NotRegistered(caller.clone()))
    }

    /// Oracle record for `caller`.
    pub fn oracle(&self, caller: &Account) -> Option<&OracleAccount> {
        self.oracles.get(caller)
    }

    pub fn is_registered(&self, caller: &Account) -> bool {
        self.oracles.contains_key(caller)
    }

    pub fn oracle_count(&self) -> usize {
        self.oracles.len()
    }

    /// Oracles holding `index`, sorted by account.
    pub fn oracles_for_index(&self, index: u8) -> Vec<Account> {
        let mut serving: Vec<Account> = self
            .oracles
            .values()
            .filter(|o| o.serves(index))
            .map(|o| o.id.clone())
            .collect();
        serving.sort();
        serving
    }

    pub(crate) fn accounts(&self) -> impl Iterator<Item = &OracleAccount> {
        self.oracles.values()
    }

    pub(crate) fn counter(&self) -> u64 {
        self.counter
    }

    pub(crate) fn restore(&mut self, oracles: Vec<OracleAccount>, counter: u64) {
        self.oracles = oracles.into_iter().map(|o| (o.id.clone(), o)).collect();
        self.counter = counter % COUNTER_ROTATION;
    }
}
