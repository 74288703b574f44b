//! Panel reducer: the narrow column set for difference-in-differences work.
//! Pure projection, no recomputation.

use crate::{
    panel_subsystem::AccountMonthRecord,
    types::{flag, AccountId, Month},
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DidReadyRecord {
    pub account_id:            AccountId,
    pub calendar_month:        Month,
    pub months_since_rollover: i32,
    #[serde(serialize_with = "flag")]
    pub treated:               bool,
    #[serde(serialize_with = "flag")]
    pub post:                  bool,
    pub event_time:            Option<i32>,
    #[serde(serialize_with = "flag")]
    pub treatment_any:         bool,
    pub treatment_intensity:   u32,
    #[serde(serialize_with = "flag")]
    pub invested_flag:         bool,
    pub invest_amount:         f64,
    #[serde(serialize_with = "flag")]
    pub active_flag:           bool,
    #[serde(serialize_with = "flag")]
    pub eligible_flag:         bool,
}

impl From<&AccountMonthRecord> for DidReadyRecord {
    fn from(r: &AccountMonthRecord) -> Self {
        Self {
            account_id:            r.account_id,
            calendar_month:        r.calendar_month,
            months_since_rollover: r.months_since_rollover,
            treated:               r.treated,
            post:                  r.post,
            event_time:            r.event_time,
            treatment_any:         r.treatment_any,
            treatment_intensity:   r.treatment_intensity,
            invested_flag:         r.invested_flag,
            invest_amount:         r.invest_amount,
            active_flag:           r.active_flag,
            eligible_flag:         r.eligible_flag,
        }
    }
}

pub fn reduce(panel: &[AccountMonthRecord]) -> Vec<DidReadyRecord> {
    panel.iter().map(DidReadyRecord::from).collect()
}
