//! Monthly panel engine invariants.

use nudgepanel_core::{
    config::SimConfig,
    engine::{self, SimOutput},
    panel_subsystem::AccountMonthRecord,
    types::{AccountId, Channel},
};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn run(seed: u64, n_accounts: usize, n_months: u32) -> SimOutput {
    let config = SimConfig { seed, n_accounts, n_months, ..SimConfig::default() };
    engine::generate(format!("inv-{seed}"), config).unwrap()
}

fn by_account(panel: &[AccountMonthRecord]) -> BTreeMap<AccountId, Vec<&AccountMonthRecord>> {
    let mut map: BTreeMap<AccountId, Vec<&AccountMonthRecord>> = BTreeMap::new();
    for r in panel {
        map.entry(r.account_id).or_default().push(r);
    }
    map
}

/// Every invariant of the panel, asserted account by account.
fn check_invariants(output: &SimOutput) {
    let n_months = output.config.n_months;
    let eligibility = output.config.response.eligibility_min_months
        ..=output.config.response.eligibility_max_months;
    let grouped = by_account(&output.panel);
    assert_eq!(grouped.len(), output.accounts.len());

    for (id, rows) in &grouped {
        let months: Vec<u32> = rows.iter().map(|r| r.calendar_month).collect();
        assert_eq!(months, (1..=n_months).collect::<Vec<_>>(), "account {id} months");

        let mut first_exposure: Option<u32> = None;
        for (i, r) in rows.iter().enumerate() {
            if let Some(prev) = i.checked_sub(1).map(|j| rows[j]) {
                if prev.invested_status {
                    assert!(r.invested_status, "account {id}: invested_status reset in month {}", r.calendar_month);
                    assert!(!r.eligible_flag, "account {id}: eligible after investing in month {}", r.calendar_month);
                    assert!(!r.invested_true, "account {id}: invested twice");
                }
                if prev.account_closed {
                    assert!(r.account_closed, "account {id}: account_closed reset");
                    assert!(!r.eligible_flag, "account {id}: eligible while closed");
                }
                if let Some(fem) = prev.first_exposure_month {
                    assert_eq!(r.first_exposure_month, Some(fem), "account {id}: first exposure overwritten");
                }
            }

            if r.treatment_any && first_exposure.is_none() {
                first_exposure = Some(r.calendar_month);
            }
            assert_eq!(r.first_exposure_month, first_exposure, "account {id} month {}", r.calendar_month);

            match r.first_exposure_month {
                Some(fem) => {
                    assert_eq!(r.event_time, Some(r.calendar_month as i32 - fem as i32));
                    assert!(r.treated && r.post);
                }
                None => {
                    assert_eq!(r.event_time, None);
                    assert!(!r.treated && !r.post);
                }
            }

            assert_eq!(r.invest_amount > 0.0, r.invested_true, "account {id}: amount vs outcome");
            if r.invested_true {
                assert!(r.invested_status);
            }

            if r.eligible_flag {
                assert!(r.active_flag);
                assert!(eligibility.contains(&r.months_since_rollover));
            }
            assert_eq!(r.active_flag, r.months_since_rollover >= 0);
            if !r.active_flag {
                assert!(!r.invested_true, "account {id}: invested before rollover");
            }

            let exposed = Channel::ALL.iter().filter(|c| r.exposed(**c)).count() as u32;
            assert_eq!(r.treatment_intensity, exposed);
            assert_eq!(r.treatment_any, exposed > 0);
            for c in Channel::ALL {
                if r.nudged(c) || r.exposed(c) {
                    assert!(r.eligible_flag, "account {id}: {c} outreach while ineligible");
                }
            }

            assert_eq!(r.missing_engagement, r.engagement_obs.is_none());
            assert_eq!(r.missing_market_return, r.market_return_obs.is_none());
            if let Some(obs) = r.market_return_obs {
                assert_eq!(obs, r.market_return);
            }
        }
    }
}

#[test]
fn invariants_hold_for_default_calibration() {
    check_invariants(&run(42, 300, 36));
}

#[test]
fn invariants_hold_with_late_rollovers() {
    let config = SimConfig {
        seed: 17,
        n_accounts: 200,
        n_months: 18,
        rollover_start: 10,
        rollover_end: 20,
        ..SimConfig::default()
    };
    let output = engine::generate("late".into(), config).unwrap();
    check_invariants(&output);
    assert!(output.panel.iter().any(|r| !r.active_flag));
}

#[test]
fn assignment_respects_contactability_and_wave_windows() {
    let output = run(8, 400, 30);
    let accounts: BTreeMap<_, _> = output.accounts.iter().map(|a| (a.account_id, a)).collect();
    let waves = &output.campaigns;

    for r in &output.panel {
        let a = accounts[&r.account_id];
        for c in Channel::ALL {
            if r.nudged(c) {
                assert!(a.contactable(c), "{c} nudge to non-contactable account");
                let wave = waves
                    .iter()
                    .find(|w| w.region == a.region && w.channel == c)
                    .unwrap();
                assert!(wave.is_active(r.calendar_month), "{c} nudge outside wave window");
            }
        }
        assert_eq!(r.email_wave_id, waves.iter().find(|w| w.region == a.region && w.channel == Channel::Email).unwrap().nudge_wave_id);
    }
}

#[test]
fn simulation_produces_exposure_and_investment() {
    let output = run(42, 500, 24);
    assert!(output.panel.iter().any(|r| r.treatment_any));
    assert!(output.panel.iter().any(|r| r.nudge_email || r.nudge_sms || r.nudge_inapp));
    assert!(output.panel.iter().any(|r| r.invested_true));
    assert!(output.summary.treated_accounts > 0);
    assert!(output.summary.invested_accounts > 0);
}

#[test]
fn label_noise_is_rare_and_does_not_move_state() {
    let output = run(3, 500, 24);
    let flipped = output.panel.iter().filter(|r| r.invested_flag != r.invested_true).count();
    let share = flipped as f64 / output.panel.len() as f64;
    assert!(share < 0.03, "label noise share {share}");

    let clean_config = SimConfig { seed: 3, n_accounts: 500, n_months: 24, label_noise_rate: 0.0, ..SimConfig::default() };
    let clean = engine::generate("clean".into(), clean_config).unwrap();
    assert!(clean.panel.iter().all(|r| r.invested_flag == r.invested_true));
    // The noise draw is always taken, so true outcomes are unchanged.
    let truth_a: Vec<bool> = output.panel.iter().map(|r| r.invested_true).collect();
    let truth_b: Vec<bool> = clean.panel.iter().map(|r| r.invested_true).collect();
    assert_eq!(truth_a, truth_b);
}

#[test]
fn zero_contamination_means_no_unassigned_exposure() {
    let config = SimConfig { seed: 11, n_accounts: 300, n_months: 24, contam_rate: 0.0, ..SimConfig::default() };
    let output = engine::generate("no-contam".into(), config).unwrap();
    for r in &output.panel {
        for c in Channel::ALL {
            if r.exposed(c) {
                assert!(r.nudged(c), "{c} exposure without assignment");
            }
        }
    }
}

#[test]
fn month_summaries_match_panel() {
    let mut engine = engine::SimEngine::build_test("summary".into(), 21).unwrap();
    engine.run().unwrap();
    let summaries = engine.month_summaries();
    assert_eq!(summaries.len(), 24);
    for (i, s) in summaries.iter().enumerate() {
        let month = i as u32 + 1;
        let rows: Vec<_> = engine.panel().iter().filter(|r| r.calendar_month == month).collect();
        assert_eq!(s.eligible, rows.iter().filter(|r| r.eligible_flag).count() as u64);
        assert_eq!(s.exposed, rows.iter().filter(|r| r.treatment_any).count() as u64);
        assert_eq!(s.invested_to_date, rows.iter().filter(|r| r.invested_status).count() as u64);
    }
    // invested_to_date never decreases
    for pair in summaries.windows(2) {
        assert!(pair[1].invested_to_date >= pair[0].invested_to_date);
        assert!(pair[1].closed_to_date >= pair[0].closed_to_date);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn invariants_hold_for_any_seed(seed in any::<u64>(), n_months in 1u32..30) {
        check_invariants(&run(seed, 60, n_months));
    }
}
