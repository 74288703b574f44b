//! The run event log.
//!
//! The engine appends one event per notable step, in execution order.
//! The log is descriptive: nothing in the simulation reads it back.

use crate::types::{Channel, Month, Region, RunId, WaveId};
use serde::{Deserialize, Serialize};

/// Every event emitted during a run.
/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Engine events ──────────────────────────────
    RunInitialized {
        run_id: RunId,
        seed: u64,
        n_accounts: usize,
        n_months: Month,
    },

    // ── Campaign events ────────────────────────────
    CampaignScheduled {
        wave_id: WaveId,
        channel: Channel,
        region: Region,
        start_month: Month,
        end_month: Month,
    },

    // ── Market events ──────────────────────────────
    MarketStateUpdated {
        month: Month,
        market_return: f64,
        seasonality: f64,
    },

    // ── Panel events ───────────────────────────────
    MonthCompleted {
        month: Month,
        summary: MonthSummary,
    },
}

impl SimEvent {
    /// Month the event belongs to; 0 for pre-simulation events.
    pub fn month(&self) -> Month {
        match self {
            Self::RunInitialized { .. } | Self::CampaignScheduled { .. } => 0,
            Self::MarketStateUpdated { month, .. } | Self::MonthCompleted { month, .. } => *month,
        }
    }

    /// Stable string name, used for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RunInitialized { .. }     => "run_initialized",
            Self::CampaignScheduled { .. }  => "campaign_scheduled",
            Self::MarketStateUpdated { .. } => "market_state_updated",
            Self::MonthCompleted { .. }     => "month_completed",
        }
    }
}

/// Head counts over one month of panel records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthSummary {
    pub active:            u64,
    pub eligible:          u64,
    pub assigned:          u64,
    pub exposed:           u64,
    pub contaminated:      u64,
    pub invested_true:     u64,
    pub invested_reported: u64,
    pub invested_to_date:  u64,
    pub closed_to_date:    u64,
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub run_id: RunId,
    pub month: Month,
    pub event_type: String,
    pub payload: String, // JSON-serialized SimEvent
}

impl EventLogEntry {
    pub fn from_event(run_id: &str, event: &SimEvent) -> serde_json::Result<Self> {
        Ok(Self {
            id: None,
            run_id: run_id.to_string(),
            month: event.month(),
            event_type: event.type_name().to_string(),
            payload: serde_json::to_string(event)?,
        })
    }
}
