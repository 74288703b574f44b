//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! The engine never executes SQL; the binary hands a finished
//! SimOutput to the store after the run.

use crate::{engine::SimOutput, error::SimResult, event::EventLogEntry, types::Month};
mod panel;
use rusqlite::{params, Connection};

pub struct SimStore {
    conn: Connection,
}

impl SimStore {
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_panel.sql"))?;
        Ok(())
    }

    /// Persist a finished run: run row, events and all four tables.
    /// All or nothing: any failed insert rolls the whole run back.
    pub fn save_output(&self, output: &SimOutput, version: &str, started_at: &str) -> SimResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        self.insert_run(&output.run_id, output.config.seed, version, started_at)?;
        for event in &output.events {
            self.append_event(&EventLogEntry::from_event(&output.run_id, event)?)?;
        }
        self.insert_accounts(&output.run_id, &output.accounts)?;
        self.insert_campaigns(&output.run_id, &output.campaigns)?;
        self.insert_panel(&output.run_id, &output.panel)?;
        tx.commit()?;
        log::info!(
            "store: saved run {} ({} accounts, {} panel rows, {} events)",
            output.run_id,
            output.accounts.len(),
            output.panel.len(),
            output.events.len()
        );
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, seed: u64, version: &str, started_at: &str) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, seed, version, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, seed as i64, version, started_at],
        )?;
        Ok(())
    }

    pub fn run_seed(&self, run_id: &str) -> SimResult<u64> {
        let seed: i64 = self.conn.query_row(
            "SELECT seed FROM run WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(seed as u64)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, month, event_type, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![entry.run_id, entry.month, entry.event_type, entry.payload],
        )?;
        Ok(())
    }

    pub fn events_for_month(&self, run_id: &str, month: Month) -> SimResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, month, event_type, payload
             FROM event_log WHERE run_id = ?1 AND month = ?2
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id, month], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    run_id:     row.get(1)?,
                    month:      row.get(2)?,
                    event_type: row.get(3)?,
                    payload:    row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, run_id: &str) -> SimResult<i64> {
        self.count("SELECT COUNT(*) FROM event_log WHERE run_id = ?1", run_id)
    }

    pub fn run_count(&self) -> SimResult<i64> {
        let n = self.conn.query_row("SELECT COUNT(*) FROM run", [], |row| row.get(0))?;
        Ok(n)
    }

    fn count(&self, sql: &str, run_id: &str) -> SimResult<i64> {
        let n = self.conn.query_row(sql, params![run_id], |row| row.get(0))?;
        Ok(n)
    }
}
