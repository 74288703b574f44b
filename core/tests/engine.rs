//! Engine lifecycle tests.

use nudgepanel_core::{engine::SimEngine, error::SimError, event::SimEvent};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn step_advances_one_month_at_a_time() {
    init_logging();
    let mut engine = SimEngine::build_test("step".into(), 42).unwrap();
    assert_eq!(engine.clock.current_month, 0);
    assert!(engine.panel().is_empty());

    engine.step().unwrap();
    assert_eq!(engine.clock.current_month, 1);
    assert_eq!(engine.panel().len(), 200);
    assert!(engine.panel().iter().all(|r| r.calendar_month == 1));

    engine.step().unwrap();
    assert_eq!(engine.panel().len(), 400);
}

#[test]
fn stepping_past_horizon_is_an_error() {
    let mut engine = SimEngine::build_test("horizon".into(), 1).unwrap();
    engine.run().unwrap();
    assert_eq!(engine.clock.current_month, 24);
    assert!(matches!(engine.step(), Err(SimError::HorizonReached { horizon: 24 })));
}

#[test]
fn carried_state_matches_last_month() {
    let mut engine = SimEngine::build_test("state".into(), 2).unwrap();
    engine.run().unwrap();
    let last: Vec<_> = engine.panel().iter().filter(|r| r.calendar_month == 24).collect();
    assert_eq!(last.len(), engine.states().len());
    for (r, s) in last.iter().zip(engine.states()) {
        assert_eq!(r.state(), *s);
    }
}

#[test]
fn event_log_follows_execution_order() {
    init_logging();
    let mut engine = SimEngine::build_test("events".into(), 3).unwrap();
    engine.run().unwrap();
    let events = engine.events();

    assert_eq!(events.len(), 1 + 12 + 2 * 24);
    assert!(matches!(events[0], SimEvent::RunInitialized { seed: 3, .. }));
    assert!(events[1..13].iter().all(|e| matches!(e, SimEvent::CampaignScheduled { .. })));
    for (i, pair) in events[13..].chunks(2).enumerate() {
        let month = i as u32 + 1;
        assert!(matches!(pair[0], SimEvent::MarketStateUpdated { month: m, .. } if m == month));
        assert!(matches!(pair[1], SimEvent::MonthCompleted { month: m, .. } if m == month));
    }
}

#[test]
fn market_return_is_shared_within_a_month() {
    let mut engine = SimEngine::build_test("market".into(), 4).unwrap();
    engine.run().unwrap();
    for month in 1..=24 {
        let rows: Vec<_> = engine.panel().iter().filter(|r| r.calendar_month == month).collect();
        let first = rows[0].market_return;
        assert!(rows.iter().all(|r| r.market_return == first));
        assert!(rows.iter().all(|r| r.seasonality_index == rows[0].seasonality_index));
    }
}

#[test]
fn summary_rates_are_shares() {
    let mut engine = SimEngine::build_test("rates".into(), 5).unwrap();
    engine.run().unwrap();
    let s = engine.summary();
    assert_eq!(s.accounts, 200);
    assert_eq!(s.panel_rows, 4800);
    assert!(s.invested_accounts <= s.accounts);
    for rate in [s.invest_rate_treated, s.invest_rate_untreated].into_iter().flatten() {
        assert!((0.0..=1.0).contains(&rate));
    }
}
