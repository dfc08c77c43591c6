//! Surety node - one insurance round against a simulated oracle network
//!
//! Funds the bootstrap airline, registers a flight and the oracle workers,
//! sells a policy, asks the oracles for the flight status and pays out.

mod config;

use anyhow::Context;
use clap::Parser;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flight_surety::{Account, FlightKey, SuretyEngine, SuretyEvent, SuretyService};
use surety_oracle::{NetworkConfig, OracleNetwork};

use crate::config::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "surety_node={level},flight_surety={level},surety_oracle={level}",
                    level = log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let surety_config = args.surety_config()?;
    let provider = args.provider_kind()?.build();

    let owner = Account::new(args.owner.as_str());
    let airline = Account::new(args.airline.as_str());
    let passenger = Account::new(args.passenger.as_str());

    let engine = SuretyEngine::builder(owner)
        .first_airline(airline.clone(), "Bootstrap Airline")
        .config(surety_config.clone())
        .build()
        .context("building engine")?;
    let service = SuretyService::new(engine);

    service
        .fund_airline(&airline, surety_config.fees.airline_fee)
        .await
        .context("funding bootstrap airline")?;
    let key: FlightKey = service
        .register_flight(&airline, &args.flight, args.departure)
        .await
        .context("registering flight")?;

    let network_config = NetworkConfig {
        oracle_count: args.oracles,
        registration_fee: surety_config.fees.registration_fee,
    };
    let network = OracleNetwork::register(service.clone(), &network_config, provider)
        .await
        .context("registering oracle network")?;

    let policy = service
        .buy_insurance(&passenger, &airline, &args.flight, args.premium)
        .await
        .context("buying insurance")?;
    info!(
        policy_id = policy.id,
        premium = %policy.premium,
        coverage = %policy.coverage,
        "Policy issued"
    );

    let mut events = service.subscribe();
    let handle = network.spawn();

    let ticket = service
        .fetch_flight_status(&passenger, &airline, &args.flight, args.departure)
        .await
        .context("opening status request")?;
    let serving = serving_oracles(&service, ticket.routing_index).await;
    info!(
        flight = %key,
        index = ticket.routing_index,
        oracles = serving,
        "Waiting for oracle quorum"
    );

    let wait = tokio::time::timeout(Duration::from_secs(args.timeout_secs), async {
        loop {
            match events.recv().await {
                Ok(recorded) => {
                    if let SuretyEvent::FlightStatusInfo { flight, status } = recorded.event {
                        if flight == key {
                            return Some(status);
                        }
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await;

    match wait {
        Ok(Some(status)) => info!(flight = %key, status = %status, "Flight status resolved"),
        Ok(None) => warn!("Event stream closed before resolution"),
        Err(_) => warn!(
            flight = %key,
            timeout_secs = args.timeout_secs,
            "Oracles did not reach quorum in time"
        ),
    }

    let balance = service.get_balance(&passenger).await;
    if balance > 0 {
        service
            .withdraw(&passenger, balance)
            .await
            .context("withdrawing payout")?;
        info!(passenger = %passenger, amount = %balance, "Payout withdrawn");
    }

    handle.shutdown().await.context("stopping oracle network")?;

    let snapshot = service.snapshot().await;
    if let Some(path) = &args.snapshot_out {
        std::fs::write(path, snapshot.to_json()?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "Snapshot written");
    }

    let summary = serde_json::json!({
        "flight": key.to_string(),
        "status": service.get_request_status(&key).await.ok().map(|s| format!("{:?}", s)),
        "policy_id": policy.id,
        "premium": policy.premium.to_string(),
        "paid_out": balance.to_string(),
        "escrow_held": snapshot.escrow.held().to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

/// Oracles holding the routing index of the request.
async fn serving_oracles(service: &SuretyService, index: u8) -> usize {
    service
        .read(|e| e.oracles().oracles_for_index(index).len())
        .await
}
