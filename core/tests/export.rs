//! CSV and manifest export tests.

use nudgepanel_core::{
    did_ready,
    engine::{self, SimEngine, SimOutput},
    export::{self, to_csv_bytes},
};
use std::{fs, path::PathBuf};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("nudgepanel-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn small_run() -> SimOutput {
    let mut engine = SimEngine::build_test("export-test".into(), 42).unwrap();
    engine.run().unwrap();
    engine.into_output()
}

fn header(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).lines().next().unwrap_or_default().to_string()
}

#[test]
fn tables_have_expected_headers() {
    let output = small_run();

    assert_eq!(
        header(&to_csv_bytes(&output.accounts).unwrap()),
        "account_id,rollover_month,baseline_balance,age_band,tenure_band,risk_tolerance,\
         digital_engagement_score,advisor_flag,region,contactable_email,contactable_sms,\
         preferred_channel,latent_effect"
    );
    assert_eq!(
        header(&to_csv_bytes(&output.campaigns).unwrap()),
        "nudge_wave_id,channel,region,start_month,end_month,eligibility_rule,intensity"
    );
    assert_eq!(
        header(&to_csv_bytes(&output.did_ready).unwrap()),
        "account_id,calendar_month,months_since_rollover,treated,post,event_time,\
         treatment_any,treatment_intensity,invested_flag,invest_amount,active_flag,eligible_flag"
    );

    let panel_header = header(&to_csv_bytes(&output.panel).unwrap());
    assert!(panel_header.starts_with("account_id,calendar_month,months_since_rollover,active_flag"));
    assert!(panel_header.ends_with("missing_market_return,market_return_obs"));
    assert_eq!(panel_header.split(',').count(), 31);
}

#[test]
fn flags_are_zero_one_and_missing_is_empty() {
    let output = small_run();
    let record = output
        .panel
        .iter()
        .find(|r| r.engagement_obs.is_none() && r.first_exposure_month.is_none())
        .expect("some masked, never-exposed row");

    let bytes = to_csv_bytes(std::slice::from_ref(record)).unwrap();
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let headers = reader.headers().unwrap().clone();
    let row = reader.records().next().unwrap().unwrap();
    let field = |name: &str| {
        let idx = headers.iter().position(|h| h == name).unwrap();
        row.get(idx).unwrap().to_string()
    };

    assert_eq!(field("engagement_obs"), "");
    assert_eq!(field("missing_engagement"), "1");
    assert_eq!(field("first_exposure_month"), "");
    assert_eq!(field("event_time"), "");
    assert_eq!(field("treated"), "0");
    assert!(matches!(field("eligible_flag").as_str(), "0" | "1"));
}

#[test]
fn categorical_values_use_display_labels() {
    let output = small_run();
    let bytes = to_csv_bytes(&output.accounts).unwrap();
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    for row in reader.records() {
        let row = row.unwrap();
        assert!(["18-34", "35-49", "50-64", "65+"].contains(&&row[3]));
        assert!(["0-2y", "3-5y", "6y+"].contains(&&row[4]));
        assert!(["low", "medium", "high"].contains(&&row[5]));
        assert!(["North", "South", "East", "West"].contains(&&row[8]));
        assert!(["email", "sms", "inapp"].contains(&&row[11]));
    }
}

#[test]
fn write_tables_creates_all_files() {
    let output = small_run();
    let dir = scratch_dir("tables");

    let paths = export::write_tables(&dir, &output).unwrap();
    assert_eq!(paths.len(), 4);
    for path in &paths {
        assert!(path.exists(), "{} missing", path.display());
    }

    let panel = fs::read(dir.join(export::PANEL_FILE)).unwrap();
    assert_eq!(panel, to_csv_bytes(&output.panel).unwrap());
    // header + one line per account-month
    assert_eq!(String::from_utf8(panel).unwrap().lines().count(), output.panel.len() + 1);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn manifest_records_config_and_summary() {
    let output = small_run();
    let dir = scratch_dir("manifest");

    let path = export::write_manifest(&dir, &output).unwrap();
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();

    assert_eq!(json["run_id"], "export-test");
    assert_eq!(json["config"]["seed"], 42);
    assert_eq!(json["config"]["n_accounts"], 200);
    assert_eq!(json["summary"]["panel_rows"], output.panel.len());
    assert_eq!(json["files"][1], export::PANEL_FILE);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn reducer_is_a_pure_projection() {
    let output = engine::generate("reduce".into(), nudgepanel_core::config::SimConfig::default_test()).unwrap();
    let reduced = did_ready::reduce(&output.panel);
    assert_eq!(reduced, output.did_ready);

    for (d, p) in reduced.iter().zip(output.panel.iter()) {
        assert_eq!(d.account_id, p.account_id);
        assert_eq!(d.calendar_month, p.calendar_month);
        assert_eq!(d.months_since_rollover, p.months_since_rollover);
        assert_eq!(d.treated, p.treated);
        assert_eq!(d.post, p.post);
        assert_eq!(d.event_time, p.event_time);
        assert_eq!(d.treatment_any, p.treatment_any);
        assert_eq!(d.treatment_intensity, p.treatment_intensity);
        assert_eq!(d.invested_flag, p.invested_flag);
        assert_eq!(d.invest_amount, p.invest_amount);
        assert_eq!(d.active_flag, p.active_flag);
        assert_eq!(d.eligible_flag, p.eligible_flag);
    }
}
