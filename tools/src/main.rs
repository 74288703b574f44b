//! panel-gen: headless generator for the cash-drag nudge panel.
//!
//! Usage:
//!   panel-gen --outdir data --seed 42 --accounts 50000 --months 36
//!   panel-gen --config calibration.json --db run.db

use anyhow::{Context, Result};
use clap::Parser;
use nudgepanel_core::{
    config::{ConfigOverrides, SimConfig},
    engine::{self, SimOutput},
    export,
    store::SimStore,
};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Generate accounts, campaigns, an account-month panel and a DiD-ready table.
#[derive(Parser, Debug)]
#[command(name = "panel-gen", version, about, long_about = None)]
struct Args {
    /// Directory the CSV tables and manifest are written to
    #[arg(long, default_value = "data")]
    outdir: PathBuf,

    /// Master seed [default: 42]
    #[arg(long)]
    seed: Option<u64>,

    /// Number of accounts [default: 50000]
    #[arg(long)]
    accounts: Option<usize>,

    /// Number of simulated months [default: 36]
    #[arg(long)]
    months: Option<u32>,

    /// JSON file overriding any configuration field; flags win over it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also persist the run to this SQLite database
    #[arg(long)]
    db: Option<String>,
}

impl Args {
    fn resolve_config(&self) -> Result<SimConfig> {
        let overrides = ConfigOverrides {
            seed:       self.seed,
            n_accounts: self.accounts,
            n_months:   self.months,
        };
        SimConfig::resolve(self.config.as_deref(), &overrides)
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = args.resolve_config()?;
    config.validate().context("invalid configuration")?;

    println!("panel-gen");
    println!("  seed:      {}", config.seed);
    println!("  accounts:  {}", config.n_accounts);
    println!("  months:    {}", config.n_months);
    println!("  outdir:    {}", args.outdir.display());
    println!();

    let started_at = chrono::Utc::now().to_rfc3339();
    let run_id = format!("run-{}-{}", config.seed, Uuid::new_v4().simple());
    let output = engine::generate(run_id, config)?;

    export::write_tables(&args.outdir, &output)
        .with_context(|| format!("writing tables to {}", args.outdir.display()))?;
    let manifest = export::write_manifest(&args.outdir, &output)?;
    log::info!("panel-gen: manifest written to {}", manifest.display());

    if let Some(db) = &args.db {
        let store = SimStore::open(db)?;
        store.migrate()?;
        store.save_output(&output, env!("CARGO_PKG_VERSION"), &started_at)?;
    }

    print_summary(&output, &args.outdir);
    Ok(())
}

fn print_summary(output: &SimOutput, outdir: &Path) {
    let s = &output.summary;
    println!("=== RUN SUMMARY ===");
    println!("  run_id:            {}", output.run_id);
    println!("  months simulated:  {}", s.months_simulated);
    println!("  accounts:          {}", s.accounts);
    println!("  campaign waves:    {}", output.campaigns.len());
    println!("  panel rows:        {}", s.panel_rows);
    println!("  treated accounts:  {}", s.treated_accounts);
    println!("  invested accounts: {}", s.invested_accounts);
    println!("  closed accounts:   {}", s.closed_accounts);
    println!(
        "  exposures:         email={} sms={} inapp={}",
        s.exposures_by_channel[0], s.exposures_by_channel[1], s.exposures_by_channel[2]
    );
    println!("  invested amount:   ${:.0}", s.total_invest_amount);
    println!(
        "  invest rate:       treated={} untreated={}",
        fmt_rate(s.invest_rate_treated),
        fmt_rate(s.invest_rate_untreated)
    );
    println!();
    println!("Wrote datasets to {}", outdir.display());
}

fn fmt_rate(rate: Option<f64>) -> String {
    rate.map(|r| format!("{:.1}%", r * 100.0))
        .unwrap_or_else(|| "n/a".into())
}
