//! Full insurance lifecycle against a single engine

use flight_surety::coordinator::{OpenOutcome, RequestStatus, ResponseOutcome};
use flight_surety::insurance::{RecordingSink, Transfer};
use flight_surety::seed::routing_index;
use flight_surety::{
    Account, FlightKey, StatusCode, SuretyEngine, SuretyError, SuretyEvent, ETHER,
};

const FLIGHT: &str = "ND1309";
const DEPARTURE: i64 = 1_700_000_000;

fn airline() -> Account {
    Account::new("AA")
}

fn passenger() -> Account {
    Account::new("passenger")
}

fn departure() -> FlightKey {
    FlightKey::new(airline(), FLIGHT, DEPARTURE)
}

/// Engine whose oracles all hold the departure's routing index.
fn engine_with_oracles(count: usize, sink: RecordingSink) -> (SuretyEngine, u8, Vec<Account>) {
    let r = routing_index(&departure(), 10);
    let seed = move |_: &Account, _: u64| {
        let mut seed = [0u8; 32];
        seed[..3].copy_from_slice(&[r, (r + 1) % 10, (r + 2) % 10]);
        seed
    };

    let mut engine = SuretyEngine::builder("owner")
        .first_airline(airline(), "American")
        .seed_source(seed)
        .payout_sink(sink)
        .build()
        .unwrap();

    engine.fund_airline(&airline(), 10 * ETHER).unwrap();
    engine.register_flight(&airline(), FLIGHT, DEPARTURE).unwrap();

    let oracles: Vec<Account> = (0..count)
        .map(|i| Account::new(format!("oracle-{}", i)))
        .collect();
    for oracle in &oracles {
        let indexes = engine.register_oracle(oracle, ETHER).unwrap();
        assert!(indexes.contains(&r));
    }
    (engine, r, oracles)
}

#[test]
fn test_late_airline_pays_three_halves() {
    let sink = RecordingSink::new();
    let (mut engine, r, oracles) = engine_with_oracles(5, sink.clone());

    engine
        .buy_insurance(&passenger(), &passenger(), &airline(), FLIGHT, 100)
        .unwrap();

    let ticket = engine
        .fetch_flight_status(&passenger(), &airline(), FLIGHT, DEPARTURE)
        .unwrap();
    assert_eq!(ticket.outcome, OpenOutcome::Opened);
    assert_eq!(ticket.routing_index, r);
    assert_eq!(engine.last_request_index(&airline(), FLIGHT), Some(r));

    let key = departure();
    for (i, oracle) in oracles.iter().take(2).enumerate() {
        let outcome = engine
            .submit_oracle_response(oracle, r, &key, StatusCode::LateAirline)
            .unwrap();
        assert_eq!(
            outcome,
            ResponseOutcome::Recorded {
                status: StatusCode::LateAirline,
                count: i + 1
            }
        );
        assert_eq!(engine.get_request_status(&key).unwrap(), RequestStatus::Pending);
    }

    let outcome = engine
        .submit_oracle_response(&oracles[2], r, &key, StatusCode::LateAirline)
        .unwrap();
    assert_eq!(
        outcome,
        ResponseOutcome::Resolved {
            status: StatusCode::LateAirline
        }
    );
    assert_eq!(
        engine.get_request_status(&key).unwrap(),
        RequestStatus::Resolved(StatusCode::LateAirline)
    );
    assert_eq!(engine.get_balance(&passenger()), 150);

    let flight = engine.flight(&airline(), FLIGHT).unwrap();
    assert!(flight.resolved);
    assert_eq!(flight.status_code, StatusCode::LateAirline);

    // Late responses after resolution are rejected and change nothing.
    let err = engine
        .submit_oracle_response(&oracles[3], r, &key, StatusCode::OnTime)
        .unwrap_err();
    assert!(matches!(err, SuretyError::UnknownRequest(_)));
    assert_eq!(engine.get_balance(&passenger()), 150);

    assert_eq!(engine.withdraw(&passenger(), 100).unwrap(), 50);
    assert_eq!(engine.withdraw(&passenger(), 50).unwrap(), 0);
    assert!(matches!(
        engine.withdraw(&passenger(), 1),
        Err(SuretyError::InsufficientBalance { .. })
    ));
    assert_eq!(
        sink.transfers(),
        vec![
            Transfer { to: passenger(), amount: 100 },
            Transfer { to: passenger(), amount: 50 },
        ]
    );
    assert_eq!(engine.escrow().paid_out, 150);

    let events: Vec<SuretyEvent> = engine.drain_events().into_iter().map(|e| e.event).collect();
    assert!(events.contains(&SuretyEvent::FlightStatusInfo {
        flight: key.clone(),
        status: StatusCode::LateAirline,
    }));
    assert!(events.contains(&SuretyEvent::PayoutCredited {
        policy_id: 1,
        passenger: passenger(),
        amount: 150,
    }));
}

#[test]
fn test_first_status_to_quorum_wins() {
    let (mut engine, r, oracles) = engine_with_oracles(6, RecordingSink::new());
    engine
        .buy_insurance(&passenger(), &passenger(), &airline(), FLIGHT, 100)
        .unwrap();
    engine
        .fetch_flight_status(&passenger(), &airline(), FLIGHT, DEPARTURE)
        .unwrap();

    let key = departure();
    let votes = [
        StatusCode::OnTime,
        StatusCode::LateWeather,
        StatusCode::OnTime,
        StatusCode::LateWeather,
        StatusCode::OnTime,
    ];
    let mut last = None;
    for (oracle, status) in oracles.iter().zip(votes) {
        last = Some(engine.submit_oracle_response(oracle, r, &key, status).unwrap());
    }
    assert_eq!(
        last,
        Some(ResponseOutcome::Resolved {
            status: StatusCode::OnTime
        })
    );

    let policies = engine.policies_for(&passenger());
    assert_eq!(policies.len(), 1);
    assert!(policies[0].payout_credited);
    assert_eq!(policies[0].payout, 0);
    assert_eq!(engine.get_balance(&passenger()), 0);
}

#[test]
fn test_response_validation() {
    let (mut engine, r, oracles) = engine_with_oracles(2, RecordingSink::new());
    let key = departure();

    let err = engine
        .submit_oracle_response(&oracles[0], r, &key, StatusCode::OnTime)
        .unwrap_err();
    assert!(matches!(err, SuretyError::UnknownRequest(_)));

    engine
        .fetch_flight_status(&passenger(), &airline(), FLIGHT, DEPARTURE)
        .unwrap();

    let wrong = (r + 1) % 10;
    let err = engine
        .submit_oracle_response(&oracles[0], wrong, &key, StatusCode::OnTime)
        .unwrap_err();
    assert!(matches!(err, SuretyError::IndexMismatch { .. }));

    engine
        .submit_oracle_response(&oracles[0], r, &key, StatusCode::OnTime)
        .unwrap();
    let err = engine
        .submit_oracle_response(&oracles[0], r, &key, StatusCode::LateOther)
        .unwrap_err();
    assert!(matches!(err, SuretyError::AlreadyResponded { .. }));
    assert!(err.is_retry_safe());

    let request = engine.coordinator().request(&key).unwrap();
    assert_eq!(request.response_count(), 1);
}

#[test]
fn test_resolved_flight_cannot_be_insured_or_reopened() {
    let (mut engine, r, oracles) = engine_with_oracles(3, RecordingSink::new());
    let key = departure();
    engine
        .fetch_flight_status(&passenger(), &airline(), FLIGHT, DEPARTURE)
        .unwrap();
    for oracle in &oracles {
        engine
            .submit_oracle_response(oracle, r, &key, StatusCode::LateTechnical)
            .unwrap();
    }

    let err = engine
        .buy_insurance(&passenger(), &passenger(), &airline(), FLIGHT, 100)
        .unwrap_err();
    assert!(matches!(err, SuretyError::FlightAlreadyResolved(_)));

    let ticket = engine
        .fetch_flight_status(&passenger(), &airline(), FLIGHT, DEPARTURE)
        .unwrap();
    assert_eq!(
        ticket.outcome,
        OpenOutcome::AlreadyResolved(StatusCode::LateTechnical)
    );

    assert_eq!(engine.archive_resolved_requests(&Account::new("owner")).unwrap(), 1);
    assert!(engine.coordinator().request(&key).is_none());
    assert_eq!(
        engine.get_request_status(&key).unwrap(),
        RequestStatus::Resolved(StatusCode::LateTechnical)
    );
}
