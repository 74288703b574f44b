//! THE MOST IMPORTANT TEST IN THE PROJECT.
//!
//! Two runs, same seed, same config.
//! They must produce byte-identical tables.
//! Any divergence is a blocker.

use nudgepanel_core::{
    config::SimConfig,
    engine::{self, SimOutput},
    export::to_csv_bytes,
};

fn run(seed: u64) -> SimOutput {
    let config = SimConfig { seed, ..SimConfig::default_test() };
    engine::generate(format!("det-test-{seed}"), config).expect("run")
}

fn tables(output: &SimOutput) -> [Vec<u8>; 4] {
    [
        to_csv_bytes(&output.accounts).expect("accounts csv"),
        to_csv_bytes(&output.panel).expect("panel csv"),
        to_csv_bytes(&output.campaigns).expect("campaigns csv"),
        to_csv_bytes(&output.did_ready).expect("did csv"),
    ]
}

#[test]
fn same_seed_produces_identical_tables() {
    const SEED: u64 = 0xDEAD_BEEF_CAFE_1234;

    let a = tables(&run(SEED));
    let b = tables(&run(SEED));

    for (i, (ta, tb)) in a.iter().zip(b.iter()).enumerate() {
        assert_eq!(ta.len(), tb.len(), "table {i} lengths differ");
        assert!(ta == tb, "table {i} diverged between runs");
    }
}

#[test]
fn same_seed_produces_identical_event_logs() {
    let a = run(7);
    let b = run(7);
    let log_a: Vec<String> = a.events.iter().map(|e| serde_json::to_string(e).unwrap()).collect();
    let log_b: Vec<String> = b.events.iter().map(|e| serde_json::to_string(e).unwrap()).collect();
    // Run ids differ only through the seed, so the logs match exactly.
    assert_eq!(log_a, log_b);
}

#[test]
fn different_seeds_produce_different_panels() {
    let a = tables(&run(42));
    let b = tables(&run(99));

    assert_ne!(a[0], b[0], "accounts should differ across seeds");
    assert_ne!(a[1], b[1], "panel should differ across seeds");
    // The campaign table is seed-independent.
    assert_eq!(a[2], b[2]);
}

#[test]
fn step_by_step_matches_full_run() {
    let config = SimConfig { seed: 5, ..SimConfig::default_test() };
    let full = engine::generate("step-test".into(), config.clone()).unwrap();

    let mut stepped = engine::SimEngine::build("step-test".into(), config).unwrap();
    while !stepped.clock.is_finished() {
        stepped.step().unwrap();
    }
    assert_eq!(
        to_csv_bytes(&full.panel).unwrap(),
        to_csv_bytes(stepped.panel()).unwrap()
    );
}
