//! Process-wide escrow accounting.

use serde::{Deserialize, Serialize};

use crate::types::{Amount, Result, SuretyError};

/// What a deposit paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowSource {
    OracleRegistration,
    AirlineFunding,
    Premium,
}

/// Running totals of value held on behalf of the federation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escrow {
    pub oracle_fees: Amount,
    pub airline_funds: Amount,
    pub premiums: Amount,
    /// Value transferred out through withdrawals
    pub paid_out: Amount,
}

impl Escrow {
    fn bucket(&self, source: EscrowSource) -> Amount {
        match source {
            EscrowSource::OracleRegistration => self.oracle_fees,
            EscrowSource::AirlineFunding => self.airline_funds,
            EscrowSource::Premium => self.premiums,
        }
    }

    /// Fail with `AmountOverflow` if a deposit could not be recorded.
    pub fn check_deposit(&self, source: EscrowSource, amount: Amount) -> Result<()> {
        self.bucket(source)
            .checked_add(amount)
            .map(|_| ())
            .ok_or(SuretyError::AmountOverflow)
    }

    /// Record a deposit.
    pub fn deposit(&mut self, source: EscrowSource, amount: Amount) -> Result<()> {
        self.check_deposit(source, amount)?;
        let bucket = match source {
            EscrowSource::OracleRegistration => &mut self.oracle_fees,
            EscrowSource::AirlineFunding => &mut self.airline_funds,
            EscrowSource::Premium => &mut self.premiums,
        };
        *bucket += amount;
        Ok(())
    }

    pub(crate) fn record_payout(&mut self, amount: Amount) -> Result<()> {
        self.paid_out = self
            .paid_out
            .checked_add(amount)
            .ok_or(SuretyError::AmountOverflow)?;
        Ok(())
    }

    pub(crate) fn reverse_payout(&mut self, amount: Amount) {
        self.paid_out = self.paid_out.saturating_sub(amount);
    }

    /// Total received minus total paid out.
    pub fn held(&self) -> Amount {
        self.oracle_fees
            .saturating_add(self.airline_funds)
            .saturating_add(self.premiums)
            .saturating_sub(self.paid_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposits_and_payouts() {
        let mut escrow = Escrow::default();
        escrow.deposit(EscrowSource::OracleRegistration, 10).unwrap();
        escrow.deposit(EscrowSource::Premium, 100).unwrap();
        escrow.record_payout(30).unwrap();
        assert_eq!(escrow.held(), 80);

        escrow.reverse_payout(30);
        assert_eq!(escrow.held(), 110);
        assert!(escrow.check_deposit(EscrowSource::Premium, Amount::MAX).is_err());
        assert!(escrow.deposit(EscrowSource::Premium, Amount::MAX).is_err());
        assert_eq!(escrow.premiums, 100);
    }
}
