//! Command line arguments for the scenario runner.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use flight_surety::{StatusCode, SuretyConfig};
use surety_oracle::ProviderKind;

/// How simulated oracles decide what to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Every oracle reports `--status`
    Fixed,
    /// Every oracle draws a status at random
    Random,
}

/// Surety node - run a flight insurance round against simulated oracles
#[derive(Parser, Debug, Clone)]
#[command(name = "surety-node")]
#[command(about = "Runs a Flight Surety engine with a simulated oracle network")]
pub struct Args {
    /// YAML engine configuration; defaults apply when omitted
    #[arg(long, env = "SURETY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Contract owner account
    #[arg(long, env = "SURETY_OWNER", default_value = "owner")]
    pub owner: String,

    /// Bootstrap airline account
    #[arg(long, env = "SURETY_AIRLINE", default_value = "AA")]
    pub airline: String,

    /// Flight code to insure
    #[arg(long, default_value = "ND1309")]
    pub flight: String,

    /// Scheduled departure (unix seconds)
    #[arg(long, default_value = "1700000000")]
    pub departure: i64,

    /// Passenger buying the policy
    #[arg(long, default_value = "passenger")]
    pub passenger: String,

    /// Premium in wei
    #[arg(long, default_value = "1000000000000000000")]
    pub premium: u128,

    /// Number of oracle workers to register
    #[arg(long, env = "SURETY_ORACLES", default_value = "20")]
    pub oracles: usize,

    /// Oracle reporting strategy
    #[arg(long, value_enum, default_value_t = Strategy::Fixed)]
    pub strategy: Strategy,

    /// Status code reported by the fixed strategy
    #[arg(long, default_value = "20")]
    pub status: u8,

    /// Seconds to wait for the oracles to reach quorum
    #[arg(long, default_value = "10")]
    pub timeout_secs: u64,

    /// Write the final engine snapshot to this path
    #[arg(long)]
    pub snapshot_out: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Engine configuration from `--config`, or the defaults.
    pub fn surety_config(&self) -> anyhow::Result<SuretyConfig> {
        match &self.config {
            Some(path) => {
                let yaml = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                SuretyConfig::from_yaml(&yaml).with_context(|| format!("parsing {}", path.display()))
            }
            None => Ok(SuretyConfig::default()),
        }
    }

    pub fn provider_kind(&self) -> anyhow::Result<ProviderKind> {
        match self.strategy {
            Strategy::Fixed => {
                let status = StatusCode::try_from(self.status).context("invalid --status")?;
                Ok(ProviderKind::Fixed(status))
            }
            Strategy::Random => Ok(ProviderKind::Random),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_run_fixed_late_airline() {
        let args = Args::try_parse_from(["surety-node"]).unwrap();
        assert_eq!(args.oracles, 20);
        assert_eq!(args.premium, flight_surety::ETHER);
        assert_eq!(
            args.provider_kind().unwrap(),
            ProviderKind::Fixed(StatusCode::LateAirline)
        );
        assert_eq!(args.surety_config().unwrap().oracles.min_responses, 3);
    }

    #[test]
    fn test_rejects_unknown_status_code() {
        let args = Args::try_parse_from(["surety-node", "--status", "25"]).unwrap();
        assert!(args.provider_kind().is_err());

        let args = Args::try_parse_from(["surety-node", "--strategy", "random"]).unwrap();
        assert_eq!(args.provider_kind().unwrap(), ProviderKind::Random);
    }
}
