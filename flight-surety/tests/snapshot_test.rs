//! Snapshot persistence and restore

use flight_surety::coordinator::RequestStatus;
use flight_surety::seed::routing_index;
use flight_surety::{
    Account, Amount, EngineSnapshot, FlightKey, StatusCode, SuretyConfig, SuretyEngine, SuretyError, ETHER,
};

fn restore(snapshot: EngineSnapshot) -> SuretyEngine {
    let json = snapshot.to_json().unwrap();
    SuretyEngine::builder("owner")
        .restore(EngineSnapshot::from_json(&json).unwrap())
        .build()
        .unwrap()
}

#[test]
fn test_restored_engine_continues_where_it_left_off() {
    let airline = Account::new("AA");
    let passenger = Account::new("passenger");
    let key = FlightKey::new(airline.clone(), "ND1309", 1_700_000_000);
    let r = routing_index(&key, 10);
    let seed = move |_: &Account, _: u64| [r; 32];

    let mut engine = SuretyEngine::builder("owner")
        .first_airline(airline.clone(), "American")
        .seed_source(seed)
        .build()
        .unwrap();
    engine.fund_airline(&airline, 10 * ETHER).unwrap();
    engine.register_flight(&airline, "ND1309", 1_700_000_000).unwrap();
    let oracles: Vec<Account> = (0..3).map(|i| Account::new(format!("o{}", i))).collect();
    for oracle in &oracles {
        engine.register_oracle(oracle, ETHER).unwrap();
    }
    engine
        .buy_insurance(&passenger, &passenger, &airline, "ND1309", ETHER)
        .unwrap();
    engine
        .fetch_flight_status(&passenger, &airline, "ND1309", 1_700_000_000)
        .unwrap();
    engine
        .submit_oracle_response(&oracles[0], r, &key, StatusCode::LateAirline)
        .unwrap();

    let json = engine.snapshot().to_json().unwrap();
    let snapshot = EngineSnapshot::from_json(&json).unwrap();
    assert_eq!(snapshot.oracles.len(), 3);
    assert_eq!(snapshot.requests.len(), 1);

    let mut restored = SuretyEngine::builder("owner")
        .seed_source(seed)
        .restore(snapshot)
        .build()
        .unwrap();
    assert!(restored.is_airline_funded(&airline));
    assert_eq!(restored.get_oracle_indexes(&oracles[1]).unwrap()[0], r);
    assert_eq!(restored.escrow().airline_funds, 10 * ETHER);
    assert_eq!(restored.get_request_status(&key).unwrap(), RequestStatus::Pending);

    // The first response survived the restore.
    assert!(matches!(
        restored.submit_oracle_response(&oracles[0], r, &key, StatusCode::LateAirline),
        Err(SuretyError::AlreadyResponded { .. })
    ));
    restored
        .submit_oracle_response(&oracles[1], r, &key, StatusCode::LateAirline)
        .unwrap();
    restored
        .submit_oracle_response(&oracles[2], r, &key, StatusCode::LateAirline)
        .unwrap();
    assert_eq!(restored.get_balance(&passenger), ETHER * 3 / 2);

    let next = restored
        .buy_insurance(&passenger, &passenger, &airline, "ND1309", 1)
        .unwrap_err();
    assert!(matches!(next, SuretyError::FlightAlreadyResolved(_)));
}

#[test]
fn test_restore_rejects_foreign_owner() {
    let engine = SuretyEngine::builder("owner")
        .first_airline("AA", "American")
        .build()
        .unwrap();
    let snapshot = engine.snapshot();

    let err = SuretyEngine::builder("someone-else")
        .restore(snapshot)
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, SuretyError::Config(_)));
}

#[test]
fn test_builder_validates_config() {
    let mut config = SuretyConfig::default();
    config.oracles.index_space = 2;
    let err = SuretyEngine::builder("owner")
        .first_airline("AA", "American")
        .config(config)
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, SuretyError::Config(_)));
}

#[test]
fn test_last_request_index_survives_archive_and_restore() {
    let owner = Account::new("owner");
    let airline = Account::new("AA");
    let key = FlightKey::new(airline.clone(), "ND1309", 1_700_000_000);
    let r = routing_index(&key, 10);
    let seed = move |_: &Account, _: u64| [r; 32];

    let mut engine = SuretyEngine::builder(owner.clone())
        .first_airline(airline.clone(), "American")
        .seed_source(seed)
        .build()
        .unwrap();
    let oracles: Vec<Account> = (0..3).map(|i| Account::new(format!("o{}", i))).collect();
    for oracle in &oracles {
        engine.register_oracle(oracle, ETHER).unwrap();
    }
    engine
        .fetch_flight_status(&owner, &airline, "ND1309", 1_700_000_000)
        .unwrap();
    for oracle in &oracles {
        engine
            .submit_oracle_response(oracle, r, &key, StatusCode::OnTime)
            .unwrap();
    }
    assert_eq!(engine.archive_resolved_requests(&owner).unwrap(), 1);

    let snapshot = engine.snapshot();
    assert!(snapshot.requests.is_empty());
    assert_eq!(snapshot.archived_requests.len(), 1);
    assert_eq!(snapshot.last_request_indexes.len(), 1);

    let restored = restore(snapshot);
    assert_eq!(restored.last_request_index(&airline, "ND1309"), Some(r));
    assert_eq!(
        restored.get_request_status(&key).unwrap(),
        RequestStatus::Resolved(StatusCode::OnTime)
    );
}

#[test]
fn test_last_request_index_tracks_latest_departure_after_restore() {
    let owner = Account::new("owner");
    let airline = Account::new("AA");
    let first = FlightKey::new(airline.clone(), "ND1309", 1_700_000_000);
    let first_index = routing_index(&first, 10);
    let second = (1..1_000)
        .map(|offset| FlightKey::new(airline.clone(), "ND1309", 1_700_000_000 + offset * 86_400))
        .find(|k| routing_index(k, 10) != first_index)
        .unwrap();
    let second_index = routing_index(&second, 10);

    let mut engine = SuretyEngine::builder(owner.clone())
        .first_airline(airline.clone(), "American")
        .build()
        .unwrap();
    engine
        .fetch_flight_status(&owner, &airline, "ND1309", first.timestamp)
        .unwrap();
    engine
        .fetch_flight_status(&owner, &airline, "ND1309", second.timestamp)
        .unwrap();
    assert_eq!(engine.last_request_index(&airline, "ND1309"), Some(second_index));

    let restored = restore(engine.snapshot());
    assert_eq!(restored.last_request_index(&airline, "ND1309"), Some(second_index));
    assert_eq!(restored.open_requests().len(), 2);
}

#[test]
fn test_restore_rejects_different_config() {
    let engine = SuretyEngine::builder("owner")
        .first_airline("AA", "American")
        .build()
        .unwrap();
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.config, SuretyConfig::default());

    let mut config = SuretyConfig::default();
    config.oracles.min_responses = 4;
    let err = SuretyEngine::builder("owner")
        .config(config.clone())
        .restore(snapshot)
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, SuretyError::Config(_)));

    let custom = SuretyEngine::builder("owner")
        .first_airline("AA", "American")
        .config(config.clone())
        .build()
        .unwrap();
    let restored = SuretyEngine::builder("owner")
        .config(config.clone())
        .restore(custom.snapshot())
        .build()
        .unwrap();
    assert_eq!(restored.config().oracles.min_responses, 4);
}

#[test]
fn test_overflowing_payout_leaves_request_open() {
    let airline = Account::new("AA");
    let passenger = Account::new("passenger");
    let key = FlightKey::new(airline.clone(), "ND1309", 1_700_000_000);
    let r = routing_index(&key, 10);
    let seed = move |_: &Account, _: u64| [r; 32];

    let mut engine = SuretyEngine::builder("owner")
        .first_airline(airline.clone(), "American")
        .seed_source(seed)
        .build()
        .unwrap();
    engine.fund_airline(&airline, 10 * ETHER).unwrap();
    engine.register_flight(&airline, "ND1309", 1_700_000_000).unwrap();
    let oracles: Vec<Account> = (0..3).map(|i| Account::new(format!("o{}", i))).collect();
    for oracle in &oracles {
        engine.register_oracle(oracle, ETHER).unwrap();
    }
    engine
        .buy_insurance(&passenger, &passenger, &airline, "ND1309", ETHER)
        .unwrap();
    engine
        .fetch_flight_status(&passenger, &airline, "ND1309", 1_700_000_000)
        .unwrap();

    let mut snapshot = engine.snapshot();
    let near_max = Amount::MAX - 10;
    snapshot.balances = vec![(passenger.clone(), near_max)];
    let mut engine = SuretyEngine::builder("owner")
        .seed_source(seed)
        .restore(snapshot)
        .build()
        .unwrap();

    engine
        .submit_oracle_response(&oracles[0], r, &key, StatusCode::LateAirline)
        .unwrap();
    engine
        .submit_oracle_response(&oracles[1], r, &key, StatusCode::LateAirline)
        .unwrap();
    assert!(matches!(
        engine.submit_oracle_response(&oracles[2], r, &key, StatusCode::LateAirline),
        Err(SuretyError::AmountOverflow)
    ));

    assert_eq!(engine.get_request_status(&key).unwrap(), RequestStatus::Pending);
    assert_eq!(engine.get_balance(&passenger), near_max);
    assert!(!engine.policies_for(&passenger)[0].payout_credited);
    // The rejected oracle has not been counted and may answer again.
    assert!(matches!(
        engine.submit_oracle_response(&oracles[2], r, &key, StatusCode::LateAirline),
        Err(SuretyError::AmountOverflow)
    ));
}
