//! Simulation clock: owns the current month and the horizon.

use crate::types::Month;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimClock {
    /// Last completed month; 0 before the first step.
    pub current_month: Month,
    pub horizon:       Month,
}

impl SimClock {
    pub fn new(horizon: Month) -> Self {
        Self { current_month: 0, horizon }
    }

    /// Advance one month. Returns the new month number.
    /// Panics if called past the horizon; callers must check.
    pub fn advance(&mut self) -> Month {
        assert!(!self.is_finished(), "advance() called past horizon {}", self.horizon);
        self.current_month += 1;
        self.current_month
    }

    pub fn is_finished(&self) -> bool {
        self.current_month >= self.horizon
    }

    pub fn months_remaining(&self) -> Month {
        self.horizon.saturating_sub(self.current_month)
    }
}
