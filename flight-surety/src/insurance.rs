//! Insurance ledger: policies, payout credits and withdrawable balances.
//!
//! A policy is credited at most once. Resolution to `LateAirline` credits
//! `premium * numerator / denominator` to the passenger; any other status
//! settles the policy with no payout. Withdrawals debit the balance before the
//! external transfer runs and roll the debit back if the transfer fails.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::config::{FeeConfig, PayoutConfig};
use crate::escrow::{Escrow, EscrowSource};
use crate::types::{Account, Amount, FlightKey, Result, StatusCode, SuretyError};

/// Error from the external transfer effect.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransferError(pub String);

/// External effect that moves withdrawn value to the recipient.
pub trait PayoutSink: Send + Sync {
    /// Transfer `amount` to `to`.
    fn transfer(&mut self, to: &Account, amount: Amount) -> std::result::Result<(), TransferError>;
}

/// A completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub to: Account,
    pub amount: Amount,
}

/// In-memory sink that records every transfer.
///
/// Clones share the same record, so a handle can be kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    transfers: Arc<Mutex<Vec<Transfer>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transfers made so far.
    pub fn transfers(&self) -> Vec<Transfer> {
        self.transfers
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }
}

impl PayoutSink for RecordingSink {
    fn transfer(&mut self, to: &Account, amount: Amount) -> std::result::Result<(), TransferError> {
        let mut transfers = self
            .transfers
            .lock()
            .map_err(|_| TransferError("transfer record poisoned".to_string()))?;
        transfers.push(Transfer {
            to: to.clone(),
            amount,
        });
        Ok(())
    }
}

/// A purchased policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsurancePolicy {
    pub id: u64,
    pub passenger: Account,
    pub flight: FlightKey,
    pub premium: Amount,
    /// Amount credited if the flight resolves to `LateAirline`
    pub coverage: Amount,
    /// Settled; never credited again
    pub payout_credited: bool,
    /// Amount actually credited at settlement
    pub payout: Amount,
}

/// Credit applied to one policy at resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutCredit {
    pub policy_id: u64,
    pub passenger: Account,
    pub amount: Amount,
}

/// Owns policies, balances and the escrow.
#[derive(Debug)]
pub struct InsuranceLedger {
    maximum_premium: Amount,
    payout: PayoutConfig,
    policies: HashMap<FlightKey, Vec<InsurancePolicy>>,
    balances: BTreeMap<Account, Amount>,
    escrow: Escrow,
    next_policy_id: u64,
}

impl InsuranceLedger {
    pub fn new(fees: &FeeConfig, payout: PayoutConfig) -> Self {
        Self {
            maximum_premium: fees.maximum_insurance_fee,
            payout,
            policies: HashMap::new(),
            balances: BTreeMap::new(),
            escrow: Escrow::default(),
            next_policy_id: 1,
        }
    }

    /// Fail with `PremiumExceedsCap` above the configured maximum.
    pub fn check_premium(&self, premium: Amount) -> Result<()> {
        if premium > self.maximum_premium {
            return Err(SuretyError::PremiumExceedsCap {
                premium,
                cap: self.maximum_premium,
            });
        }
        Ok(())
    }

    fn coverage_for(&self, premium: Amount) -> Result<Amount> {
        premium
            .checked_mul(self.payout.numerator)
            .map(|p| p / self.payout.denominator)
            .ok_or(SuretyError::AmountOverflow)
    }

    /// Record a policy on a registered flight.
    ///
    /// Flight lookup and the operating gate are the engine's job.
    pub fn buy(&mut self, passenger: &Account, flight: FlightKey, premium: Amount) -> Result<InsurancePolicy> {
        self.check_premium(premium)?;
        let coverage = self.coverage_for(premium)?;
        self.escrow.deposit(EscrowSource::Premium, premium)?;

        let policy = InsurancePolicy {
            id: self.next_policy_id,
            passenger: passenger.clone(),
            flight,
            premium,
            coverage,
            payout_credited: false,
            payout: 0,
        };
        self.next_policy_id += 1;

        info!(
            policy_id = policy.id,
            passenger = %passenger,
            flight = %policy.flight,
            premium = %premium,
            "Insurance purchased"
        );
        self.policies
            .entry(policy.flight.clone())
            .or_default()
            .push(policy.clone());
        Ok(policy)
    }

    /// Balances after crediting every unsettled policy on `key` for `status`.
    ///
    /// Fails with `AmountOverflow` if any credit would not fit.
    fn settled_balances(&self, key: &FlightKey, status: StatusCode) -> Result<BTreeMap<Account, Amount>> {
        let mut projected = BTreeMap::new();
        if status != StatusCode::LateAirline {
            return Ok(projected);
        }
        for policy in self.policies_on(key).iter().filter(|p| !p.payout_credited) {
            let current = match projected.get(&policy.passenger) {
                Some(balance) => *balance,
                None => self.get_balance(&policy.passenger),
            };
            let credited = current
                .checked_add(policy.coverage)
                .ok_or(SuretyError::AmountOverflow)?;
            projected.insert(policy.passenger.clone(), credited);
        }
        Ok(projected)
    }

    /// Fail with `AmountOverflow` if resolving `key` to `status` could not be credited.
    pub fn check_settlement(&self, key: &FlightKey, status: StatusCode) -> Result<()> {
        self.settled_balances(key, status).map(|_| ())
    }

    /// Settle every unsettled policy on `key` against the resolved status.
    ///
    /// All or nothing: on `AmountOverflow` no policy is touched.
    pub fn on_status_resolved(&mut self, key: &FlightKey, status: StatusCode) -> Result<Vec<PayoutCredit>> {
        let projected = self.settled_balances(key, status)?;
        let Some(policies) = self.policies.get_mut(key) else {
            return Ok(Vec::new());
        };

        let mut credits = Vec::new();
        for policy in policies.iter_mut().filter(|p| !p.payout_credited) {
            policy.payout_credited = true;
            if status != StatusCode::LateAirline {
                continue;
            }
            policy.payout = policy.coverage;
            credits.push(PayoutCredit {
                policy_id: policy.id,
                passenger: policy.passenger.clone(),
                amount: policy.coverage,
            });
        }
        self.balances.extend(projected);

        info!(
            flight = %key,
            status = %status,
            credited = credits.len(),
            "Policies settled"
        );
        Ok(credits)
    }

    /// Withdraw `amount` from `caller`'s balance through `sink`.
    ///
    /// Returns the remaining balance.
    pub fn withdraw(&mut self, caller: &Account, amount: Amount, sink: &mut dyn PayoutSink) -> Result<Amount> {
        let available = self.get_balance(caller);
        if amount > available {
            return Err(SuretyError::InsufficientBalance {
                requested: amount,
                available,
            });
        }

        // Debit first; the transfer must never observe the old balance.
        self.escrow.record_payout(amount)?;
        let remaining = available - amount;
        self.balances.insert(caller.clone(), remaining);

        if let Err(e) = sink.transfer(caller, amount) {
            warn!(account = %caller, amount = %amount, error = %e, "Transfer failed, debit rolled back");
            self.balances.insert(caller.clone(), available);
            self.escrow.reverse_payout(amount);
            return Err(SuretyError::TransferFailed(e.to_string()));
        }

        info!(account = %caller, amount = %amount, remaining = %remaining, "Balance withdrawn");
        Ok(remaining)
    }

    pub fn get_balance(&self, account: &Account) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Policies held by `passenger`, ordered by id.
    pub fn policies_for(&self, passenger: &Account) -> Vec<InsurancePolicy> {
        let mut held: Vec<InsurancePolicy> = self
            .policies
            .values()
            .flatten()
            .filter(|p| &p.passenger == passenger)
            .cloned()
            .collect();
        held.sort_by_key(|p| p.id);
        held
    }

    /// Policies sold on a departure.
    pub fn policies_on(&self, key: &FlightKey) -> &[InsurancePolicy] {
        self.policies.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn escrow(&self) -> &Escrow {
        &self.escrow
    }

    pub(crate) fn escrow_mut(&mut self) -> &mut Escrow {
        &mut self.escrow
    }

    pub(crate) fn tables(&self) -> (Vec<InsurancePolicy>, Vec<(Account, Amount)>) {
        let mut policies: Vec<InsurancePolicy> = self.policies.values().flatten().cloned().collect();
        policies.sort_by_key(|p| p.id);
        let balances = self.balances.iter().map(|(a, b)| (a.clone(), *b)).collect();
        (policies, balances)
    }

    pub(crate) fn restore(&mut self, policies: Vec<InsurancePolicy>, balances: Vec<(Account, Amount)>, escrow: Escrow) {
        self.next_policy_id = policies.iter().map(|p| p.id + 1).max().unwrap_or(1);
        self.policies.clear();
        for policy in policies {
            self.policies.entry(policy.flight.clone()).or_default().push(policy);
        }
        self.balances = balances.into_iter().collect();
        self.escrow = escrow;
    }
}
