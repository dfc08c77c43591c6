//! Identity ledger: owner, authorized callers and the operating gate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

use crate::types::{Account, Result, SuretyError};

/// Role flags for accounts plus the global operating flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityLedger {
    /// Contract owner, fixed at bootstrap
    owner: Account,
    /// Accounts allowed to run administrative operations
    authorized: BTreeSet<Account>,
    /// Global operating flag
    operational: bool,
}

impl IdentityLedger {
    /// Create a ledger owned by `owner`, who is authorized from the start.
    pub fn new(owner: Account) -> Self {
        let mut authorized = BTreeSet::new();
        authorized.insert(owner.clone());
        Self {
            owner,
            authorized,
            operational: true,
        }
    }

    /// The owner account.
    pub fn owner(&self) -> &Account {
        &self.owner
    }

    pub fn is_owner(&self, account: &Account) -> bool {
        &self.owner == account
    }

    pub fn is_authorized_caller(&self, account: &Account) -> bool {
        self.authorized.contains(account)
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    /// Fail with `NotOperational` when the gate is closed.
    pub fn require_operational(&self) -> Result<()> {
        if self.operational {
            Ok(())
        } else {
            Err(SuretyError::NotOperational)
        }
    }

    /// Fail with `NotAuthorized` unless `caller` is an authorized caller.
    pub fn require_authorized(&self, caller: &Account) -> Result<()> {
        if self.is_authorized_caller(caller) {
            Ok(())
        } else {
            Err(SuretyError::NotAuthorized(caller.clone()))
        }
    }

    fn require_owner(&self, caller: &Account) -> Result<()> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            Err(SuretyError::NotOwner(caller.clone()))
        }
    }

    /// Flip the operating gate. Owner only.
    pub fn set_operating_status(&mut self, caller: &Account, operational: bool) -> Result<()> {
        self.require_owner(caller)?;
        if self.operational != operational {
            info!(operational = operational, "Operating status changed");
        }
        self.operational = operational;
        Ok(())
    }

    /// Grant authorized-caller status. Owner only.
    pub fn authorize_caller(&mut self, caller: &Account, account: Account) -> Result<()> {
        self.require_owner(caller)?;
        if self.authorized.insert(account.clone()) {
            info!(account = %account, "Caller authorized");
        }
        Ok(())
    }

    /// Revoke authorized-caller status. Owner only; the owner always stays authorized.
    pub fn deauthorize_caller(&mut self, caller: &Account, account: &Account) -> Result<()> {
        self.require_owner(caller)?;
        if self.is_owner(account) {
            return Ok(());
        }
        if self.authorized.remove(account) {
            info!(account = %account, "Caller deauthorized");
        }
        Ok(())
    }
}
