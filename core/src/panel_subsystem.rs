//! Monthly panel engine: the per-account state machine.
//!
//! Each month, every account moves through the same pipeline:
//!   1. Eligibility       (rollover window, not invested, not closed)
//!   2. Assignment        (per channel, wave must be live in the region)
//!   3. Exposure          (open/view given assignment, or contamination)
//!   4. Treatment dosage  (weighted exposures minus multi-channel penalty)
//!   5. Investment        (logistic propensity, zeroed when ineligible to act)
//!   6. Label noise       (reported flag only)
//!   7. Amount            (balance × allocation fraction)
//!   8. State update      (first exposure, invested, closed, in that order)
//!   9. Missingness       (observed engagement and market return)
//!  10. Derived fields    (event_time, treated, post)
//!
//! RULES:
//!   - A month reads only the carried state from the end of the prior month.
//!   - One account's step never reads another account's state.
//!   - Draws come from the panel stream in a fixed order and are always
//!     taken, so the stream position never depends on outcomes.

use crate::{
    account_subsystem::AccountRecord,
    campaign_subsystem::CampaignSchedule,
    config::{ResponseModel, SimConfig},
    error::{SimError, SimResult},
    market_subsystem::MarketState,
    rng::SubsystemRng,
    types::{flag, AccountId, Channel, Month, WaveId},
};
use rand_distr::Beta;
use serde::{Deserialize, Serialize};

// ── Carried state ────────────────────────────────────────────────────────────

/// Everything an account carries from one month into the next.
/// All three fields are monotone: flags only turn on, and the first
/// exposure month is written at most once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub invested_status:      bool,
    pub account_closed:       bool,
    pub first_exposure_month: Option<Month>,
}

impl AccountState {
    /// State at the end of `month`, given that month's outcomes.
    pub fn advance(self, month: Month, exposed_any: bool, invested: bool, closed_now: bool) -> Self {
        let first_exposure_month = match self.first_exposure_month {
            Some(m) => Some(m),
            None if exposed_any => Some(month),
            None => None,
        };
        Self {
            first_exposure_month,
            invested_status: self.invested_status || invested,
            account_closed: self.account_closed || closed_now,
        }
    }

    pub fn treated(&self) -> bool {
        self.first_exposure_month.is_some()
    }

    /// Months since first exposure, if any.
    pub fn event_time(&self, month: Month) -> Option<i32> {
        self.first_exposure_month
            .map(|first| month as i32 - first as i32)
    }

    pub fn post(&self, month: Month) -> bool {
        self.first_exposure_month.is_some_and(|first| month >= first)
    }
}

// ── Per account-month draws ─────────────────────────────────────────────────

/// The uniforms (and allocation fraction) one account consumes in one month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthDraws {
    pub assign:             [f64; 3],
    pub open:               [f64; 3],
    pub contaminate:        [f64; 3],
    pub invest:             f64,
    pub label_noise:        f64,
    /// Share of balance moved if the account invests, in (0, 1).
    pub allocation:         f64,
    pub close:              f64,
    pub missing_engagement: f64,
    pub missing_market:     f64,
}

impl MonthDraws {
    pub fn draw(rng: &mut SubsystemRng, allocation: &Beta<f64>) -> Self {
        let assign = [rng.next_f64(), rng.next_f64(), rng.next_f64()];
        let open = [rng.next_f64(), rng.next_f64(), rng.next_f64()];
        let contaminate = [rng.next_f64(), rng.next_f64(), rng.next_f64()];
        let invest = rng.next_f64();
        let label_noise = rng.next_f64();
        let allocation = rng.sample(allocation);
        let close = rng.next_f64();
        let missing_engagement = rng.next_f64();
        let missing_market = rng.next_f64();
        Self {
            assign,
            open,
            contaminate,
            invest,
            label_noise,
            allocation,
            close,
            missing_engagement,
            missing_market,
        }
    }
}

// ── Output record ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountMonthRecord {
    pub account_id:            AccountId,
    pub calendar_month:        Month,
    pub months_since_rollover: i32,
    #[serde(serialize_with = "flag")]
    pub active_flag:           bool,
    #[serde(serialize_with = "flag")]
    pub eligible_flag:         bool,
    pub market_return:         f64,
    pub seasonality_index:     f64,
    #[serde(serialize_with = "flag")]
    pub nudge_email:           bool,
    #[serde(serialize_with = "flag")]
    pub nudge_sms:             bool,
    #[serde(serialize_with = "flag")]
    pub nudge_inapp:           bool,
    #[serde(serialize_with = "flag")]
    pub exposure_email:        bool,
    #[serde(serialize_with = "flag")]
    pub exposure_sms:          bool,
    #[serde(serialize_with = "flag")]
    pub exposure_inapp:        bool,
    pub email_wave_id:         WaveId,
    pub sms_wave_id:           WaveId,
    pub inapp_wave_id:         WaveId,
    #[serde(serialize_with = "flag")]
    pub treatment_any:         bool,
    pub treatment_intensity:   u32,
    pub first_exposure_month:  Option<Month>,
    pub event_time:            Option<i32>,
    #[serde(serialize_with = "flag")]
    pub treated:               bool,
    #[serde(serialize_with = "flag")]
    pub post:                  bool,
    #[serde(serialize_with = "flag")]
    pub invested_true:         bool,
    #[serde(serialize_with = "flag")]
    pub invested_flag:         bool,
    #[serde(serialize_with = "flag")]
    pub invested_status:       bool,
    pub invest_amount:         f64,
    #[serde(serialize_with = "flag")]
    pub account_closed:        bool,
    #[serde(serialize_with = "flag")]
    pub missing_engagement:    bool,
    pub engagement_obs:        Option<f64>,
    #[serde(serialize_with = "flag")]
    pub missing_market_return: bool,
    pub market_return_obs:     Option<f64>,
}

impl AccountMonthRecord {
    pub fn nudged(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.nudge_email,
            Channel::Sms   => self.nudge_sms,
            Channel::InApp => self.nudge_inapp,
        }
    }

    pub fn exposed(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.exposure_email,
            Channel::Sms   => self.exposure_sms,
            Channel::InApp => self.exposure_inapp,
        }
    }

    /// Carried state as of the end of this record's month.
    pub fn state(&self) -> AccountState {
        AccountState {
            invested_status:      self.invested_status,
            account_closed:       self.account_closed,
            first_exposure_month: self.first_exposure_month,
        }
    }
}

// ── Subsystem ────────────────────────────────────────────────────────────────

pub fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub struct PanelSubsystem {
    model:                   ResponseModel,
    contam_rate:             f64,
    label_noise_rate:        f64,
    close_rate:              f64,
    missing_engagement_rate: f64,
    missing_market_rate:     f64,
    allocation:              Beta<f64>,
}

impl PanelSubsystem {
    pub fn new(config: &SimConfig) -> SimResult<Self> {
        let allocation = Beta::new(config.response.allocation_alpha, config.response.allocation_beta)
            .map_err(|e| SimError::invalid("response.allocation_alpha", e.to_string()))?;
        Ok(Self {
            model: config.response.clone(),
            contam_rate: config.contam_rate,
            label_noise_rate: config.label_noise_rate,
            close_rate: config.close_rate,
            missing_engagement_rate: config.missing_engagement_rate,
            missing_market_rate: config.missing_market_rate,
            allocation,
        })
    }

    /// Simulate one month for every account, in id order.
    /// `states` holds end-of-previous-month state and is replaced in place.
    pub fn step_month(
        &self,
        market: &MarketState,
        accounts: &[AccountRecord],
        schedule: &CampaignSchedule,
        states: &mut [AccountState],
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<AccountMonthRecord>> {
        debug_assert_eq!(accounts.len(), states.len());
        let mut records = Vec::with_capacity(accounts.len());
        for (account, state) in accounts.iter().zip(states.iter_mut()) {
            let draws = MonthDraws::draw(rng, &self.allocation);
            let (record, next) = self.step_account(market, account, schedule, *state, &draws)?;
            *state = next;
            records.push(record);
        }
        Ok(records)
    }

    /// One account's month as a pure function of its prior state and draws.
    pub fn step_account(
        &self,
        market: &MarketState,
        account: &AccountRecord,
        schedule: &CampaignSchedule,
        state: AccountState,
        draws: &MonthDraws,
    ) -> SimResult<(AccountMonthRecord, AccountState)> {
        let m = &self.model;
        let month = market.month;
        let engagement = account.digital_engagement_score;
        let balance = account.baseline_balance;

        // 1. Eligibility
        let msr = account.months_since_rollover(month);
        let active = msr >= 0;
        let eligible = active
            && msr >= m.eligibility_min_months
            && msr <= m.eligibility_max_months
            && !state.invested_status
            && !state.account_closed;

        // 2-3. Assignment and exposure, channel by channel
        let p_assign = m.assignment_probability(engagement, balance);
        let mut assigned = [false; 3];
        let mut exposed = [false; 3];
        for channel in Channel::ALL {
            let i = channel.index();
            assigned[i] = eligible
                && account.contactable(channel)
                && schedule.is_active(channel, account.region, month)
                && draws.assign[i] < p_assign;

            let opened = assigned[i] && draws.open[i] < m.channel(channel).open_probability(engagement);
            let contaminated = eligible && !assigned[i] && draws.contaminate[i] < self.contam_rate;
            exposed[i] = opened || contaminated;
        }

        // 4. Treatment dosage
        let n_exposed = exposed.iter().filter(|e| **e).count() as u32;
        let treatment = self.treatment_effect(&exposed);

        // 5. Investment decision
        let msr_model = if active { msr } else { 0 };
        let logit = self.investment_logit(account, msr_model, market) + treatment;
        let p_invest = if active && !state.invested_status && !state.account_closed {
            logistic(logit)
        } else {
            0.0
        };
        let invested_true = draws.invest < p_invest;

        // 6. Label noise on the reported flag only
        let invested_flag = if draws.label_noise < self.label_noise_rate {
            !invested_true
        } else {
            invested_true
        };

        // 7. Amount
        let invest_amount = if invested_true { balance * draws.allocation } else { 0.0 };

        // 8. State update
        let closed_now = !state.account_closed && draws.close < self.close_rate;
        let next = state.advance(month, n_exposed > 0, invested_true, closed_now);

        // 9. Missingness
        let missing_engagement = draws.missing_engagement < self.missing_engagement_rate;
        let missing_market_return = draws.missing_market < self.missing_market_rate;

        let record = AccountMonthRecord {
            account_id: account.account_id,
            calendar_month: month,
            months_since_rollover: msr,
            active_flag: active,
            eligible_flag: eligible,
            market_return: market.market_return,
            seasonality_index: market.seasonality,
            nudge_email: assigned[Channel::Email.index()],
            nudge_sms: assigned[Channel::Sms.index()],
            nudge_inapp: assigned[Channel::InApp.index()],
            exposure_email: exposed[Channel::Email.index()],
            exposure_sms: exposed[Channel::Sms.index()],
            exposure_inapp: exposed[Channel::InApp.index()],
            email_wave_id: schedule.wave_id(Channel::Email, account.region)?,
            sms_wave_id: schedule.wave_id(Channel::Sms, account.region)?,
            inapp_wave_id: schedule.wave_id(Channel::InApp, account.region)?,
            treatment_any: n_exposed > 0,
            treatment_intensity: n_exposed,
            // 10. Derived fields
            first_exposure_month: next.first_exposure_month,
            event_time: next.event_time(month),
            treated: next.treated(),
            post: next.post(month),
            invested_true,
            invested_flag,
            invested_status: next.invested_status,
            invest_amount,
            account_closed: next.account_closed,
            missing_engagement,
            engagement_obs: (!missing_engagement).then_some(engagement),
            missing_market_return,
            market_return_obs: (!missing_market_return).then_some(market.market_return),
        };

        Ok((record, next))
    }

    /// Real-valued logit shift from this month's exposures.
    pub fn treatment_effect(&self, exposed: &[bool; 3]) -> f64 {
        let mut effect = 0.0;
        let mut n_exposed = 0u32;
        for channel in Channel::ALL {
            if exposed[channel.index()] {
                effect += self.model.channel(channel).treatment_weight;
                n_exposed += 1;
            }
        }
        effect - self.model.multi_channel_penalty * n_exposed.saturating_sub(1) as f64
    }

    /// Investment logit before treatment.
    pub fn investment_logit(&self, account: &AccountRecord, msr_model: i32, market: &MarketState) -> f64 {
        let w = &self.model.logit;
        w.intercept
            + w.log_balance * account.baseline_balance.ln()
            + w.engagement * account.digital_engagement_score
            + w.months_since_rollover * msr_model as f64
            + w.market_return * market.market_return
            + w.advisor * if account.advisor_flag { 1.0 } else { 0.0 }
            + market.seasonality
            + account.latent_effect
    }
}
