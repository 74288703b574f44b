//! Tabular output: the four CSV tables and the run manifest.
//!
//! Flags are written as 0/1 and missing values as empty fields.
//! Rows are written in engine order, so identical runs give identical bytes.

use crate::{
    config::SimConfig,
    engine::{RunSummary, SimOutput},
    error::SimResult,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

pub const ACCOUNTS_FILE: &str = "accounts.csv";
pub const PANEL_FILE: &str = "account_month.csv";
pub const CAMPAIGNS_FILE: &str = "nudge_campaigns.csv";
pub const DID_READY_FILE: &str = "did_ready.csv";
pub const MANIFEST_FILE: &str = "run_manifest.json";

/// Write rows with a header derived from the record's field names.
pub fn write_csv<W: Write, T: Serialize>(writer: W, rows: &[T]) -> SimResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn to_csv_bytes<T: Serialize>(rows: &[T]) -> SimResult<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(&mut buf, rows)?;
    Ok(buf)
}

fn write_csv_file<T: Serialize>(path: &Path, rows: &[T]) -> SimResult<()> {
    let file = fs::File::create(path)?;
    write_csv(std::io::BufWriter::new(file), rows)?;
    log::debug!("export: wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Write accounts, panel, campaigns and DiD-ready tables into `outdir`,
/// creating it if needed. Returns the written paths in that order.
pub fn write_tables(outdir: &Path, output: &SimOutput) -> SimResult<Vec<PathBuf>> {
    fs::create_dir_all(outdir)?;

    let accounts = outdir.join(ACCOUNTS_FILE);
    let panel = outdir.join(PANEL_FILE);
    let campaigns = outdir.join(CAMPAIGNS_FILE);
    let did_ready = outdir.join(DID_READY_FILE);

    write_csv_file(&accounts, &output.accounts)?;
    write_csv_file(&panel, &output.panel)?;
    write_csv_file(&campaigns, &output.campaigns)?;
    write_csv_file(&did_ready, &output.did_ready)?;

    log::info!("export: wrote 4 tables to {}", outdir.display());
    Ok(vec![accounts, panel, campaigns, did_ready])
}

/// Provenance record written next to the tables.
#[derive(Debug, Serialize)]
pub struct RunManifest<'a> {
    pub run_id:       &'a str,
    pub generated_at: DateTime<Utc>,
    pub version:      &'static str,
    pub config:       &'a SimConfig,
    pub summary:      &'a RunSummary,
    pub files:        [&'static str; 4],
}

impl<'a> RunManifest<'a> {
    pub fn new(output: &'a SimOutput, generated_at: DateTime<Utc>) -> Self {
        Self {
            run_id: &output.run_id,
            generated_at,
            version: env!("CARGO_PKG_VERSION"),
            config: &output.config,
            summary: &output.summary,
            files: [ACCOUNTS_FILE, PANEL_FILE, CAMPAIGNS_FILE, DID_READY_FILE],
        }
    }
}

pub fn write_manifest(outdir: &Path, output: &SimOutput) -> SimResult<PathBuf> {
    fs::create_dir_all(outdir)?;
    let path = outdir.join(MANIFEST_FILE);
    let manifest = RunManifest::new(output, Utc::now());
    fs::write(&path, serde_json::to_string_pretty(&manifest)?)?;
    Ok(path)
}
