//! Configuration for the surety engine.

use serde::{Deserialize, Serialize};

use crate::types::{Amount, Result, SuretyError, ETHER};

/// Configuration for a [`SuretyEngine`](crate::SuretyEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SuretyConfig {
    /// Fee configuration
    #[serde(default)]
    pub fees: FeeConfig,
    /// Oracle routing configuration
    #[serde(default)]
    pub oracles: OracleConfig,
    /// Airline admission configuration
    #[serde(default)]
    pub governance: GovernanceConfig,
    /// Insurance payout configuration
    #[serde(default)]
    pub payout: PayoutConfig,
}

impl SuretyConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| SuretyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| SuretyError::Config(e.to_string()))
    }

    /// Reject configurations the engine cannot operate under.
    pub fn validate(&self) -> Result<()> {
        let oracles = &self.oracles;
        if oracles.index_space == 0 || oracles.index_space > 256 {
            return Err(SuretyError::Config(format!(
                "index_space must be in 1..=256, got {}",
                oracles.index_space
            )));
        }
        if oracles.indexes_per_oracle == 0 || oracles.indexes_per_oracle > oracles.index_space {
            return Err(SuretyError::Config(format!(
                "indexes_per_oracle must be in 1..={}, got {}",
                oracles.index_space, oracles.indexes_per_oracle
            )));
        }
        if oracles.min_responses == 0 {
            return Err(SuretyError::Config("min_responses must be positive".to_string()));
        }
        if self.payout.denominator == 0 {
            return Err(SuretyError::Config("payout denominator must be positive".to_string()));
        }
        Ok(())
    }
}

/// Fees and caps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Fee an oracle pays to register
    pub registration_fee: Amount,
    /// One-time participation fee for airlines
    pub airline_fee: Amount,
    /// Maximum premium for a single policy
    pub maximum_insurance_fee: Amount,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            registration_fee: ETHER,
            airline_fee: 10 * ETHER,
            maximum_insurance_fee: ETHER,
        }
    }
}

/// Oracle routing and quorum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Size of the routing index space
    pub index_space: u16,
    /// Indexes assigned to each oracle
    pub indexes_per_oracle: u16,
    /// Matching responses required to resolve a request
    pub min_responses: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            index_space: 10,
            indexes_per_oracle: 3,
            min_responses: 3,
        }
    }
}

/// Airline admission rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Registered airlines below which admission is direct
    pub bootstrap_size: usize,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self { bootstrap_size: 4 }
    }
}

/// Payout multiplier as `numerator / denominator` of the premium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutConfig {
    pub numerator: Amount,
    pub denominator: Amount,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            numerator: 3,
            denominator: 2,
        }
    }
}
