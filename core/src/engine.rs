//! The simulation engine: wires the generators to the monthly panel.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   build():
//!     1. Config validation      (fails before any draw)
//!     2. Account generator      (account stream)
//!     3. Campaign scheduler     (no randomness)
//!   step(), once per month:
//!     4. Market subsystem       (market stream, one draw)
//!     5. Panel subsystem        (panel stream, accounts in id order)
//!
//! RULES:
//!   - Month m reads only state carried out of month m-1.
//!   - All randomness flows through the RngBank.
//!   - Outputs are append-only; nothing reads back from a later stage.

use crate::{
    account_subsystem::{AccountRecord, AccountSubsystem},
    campaign_subsystem::{CampaignSchedule, CampaignWave},
    clock::SimClock,
    config::SimConfig,
    did_ready::{self, DidReadyRecord},
    error::{SimError, SimResult},
    event::{MonthSummary, SimEvent},
    market_subsystem::MarketSubsystem,
    panel_subsystem::{AccountMonthRecord, AccountState, PanelSubsystem},
    rng::{RngBank, SubsystemRng, SubsystemSlot},
    types::{Channel, Month, RunId},
};
use serde::{Deserialize, Serialize};

pub struct SimEngine {
    pub run_id:     RunId,
    pub clock:      SimClock,
    config:         SimConfig,
    accounts:       Vec<AccountRecord>,
    schedule:       CampaignSchedule,
    states:         Vec<AccountState>,
    market:         MarketSubsystem,
    panel:          PanelSubsystem,
    market_rng:     SubsystemRng,
    panel_rng:      SubsystemRng,
    records:        Vec<AccountMonthRecord>,
    summaries:      Vec<MonthSummary>,
    events:         Vec<SimEvent>,
}

impl SimEngine {
    /// Validate the config, generate accounts and schedule campaigns.
    pub fn build(run_id: RunId, config: SimConfig) -> SimResult<Self> {
        config.validate()?;

        let rng_bank = RngBank::new(config.seed);
        let mut account_rng = rng_bank.for_subsystem(SubsystemSlot::Account);
        let accounts = AccountSubsystem::new(&config)?.generate(&mut account_rng);
        let schedule = CampaignSchedule::build(&config);

        let mut events = vec![SimEvent::RunInitialized {
            run_id:     run_id.clone(),
            seed:       config.seed,
            n_accounts: config.n_accounts,
            n_months:   config.n_months,
        }];
        events.extend(schedule.waves.iter().map(|w| SimEvent::CampaignScheduled {
            wave_id:     w.nudge_wave_id,
            channel:     w.channel,
            region:      w.region,
            start_month: w.start_month,
            end_month:   w.end_month,
        }));

        log::info!(
            "engine: run={run_id} seed={} accounts={} waves={} months={}",
            config.seed,
            accounts.len(),
            schedule.waves.len(),
            config.n_months
        );

        Ok(Self {
            clock:      SimClock::new(config.n_months),
            states:     vec![AccountState::default(); accounts.len()],
            market:     MarketSubsystem::new(&config.market)?,
            panel:      PanelSubsystem::new(&config)?,
            market_rng: rng_bank.for_subsystem(SubsystemSlot::Market),
            panel_rng:  rng_bank.for_subsystem(SubsystemSlot::Panel),
            records:    Vec::with_capacity(accounts.len() * config.n_months as usize),
            summaries:  Vec::with_capacity(config.n_months as usize),
            accounts,
            schedule,
            events,
            config,
            run_id,
        })
    }

    /// Small engine for tests: SimConfig::default_test() with `seed`.
    pub fn build_test(run_id: RunId, seed: u64) -> SimResult<Self> {
        Self::build(run_id, SimConfig { seed, ..SimConfig::default_test() })
    }

    /// Advance one month. This is the core simulation step.
    pub fn step(&mut self) -> SimResult<MonthSummary> {
        if self.clock.is_finished() {
            return Err(SimError::HorizonReached { horizon: self.clock.horizon });
        }
        let month = self.clock.advance();

        let market = self.market.update(month, &mut self.market_rng);
        self.events.push(SimEvent::MarketStateUpdated {
            month,
            market_return: market.market_return,
            seasonality:   market.seasonality,
        });

        let records = self.panel.step_month(
            &market,
            &self.accounts,
            &self.schedule,
            &mut self.states,
            &mut self.panel_rng,
        )?;

        let summary = summarize_month(&records);
        log::debug!(
            "month={month} panel: eligible={} assigned={} exposed={} invested={} closed={}",
            summary.eligible,
            summary.assigned,
            summary.exposed,
            summary.invested_true,
            summary.closed_to_date
        );

        self.records.extend(records);
        self.summaries.push(summary);
        self.events.push(SimEvent::MonthCompleted { month, summary });
        Ok(summary)
    }

    /// Run every remaining month up to the horizon.
    pub fn run(&mut self) -> SimResult<()> {
        while !self.clock.is_finished() {
            self.step()?;
        }
        let summary = self.summary();
        log::info!(
            "engine: run={} complete, {} panel rows, {} treated, {} invested",
            self.run_id,
            summary.panel_rows,
            summary.treated_accounts,
            summary.invested_accounts
        );
        Ok(())
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn accounts(&self) -> &[AccountRecord] {
        &self.accounts
    }

    pub fn schedule(&self) -> &CampaignSchedule {
        &self.schedule
    }

    pub fn campaigns(&self) -> &[CampaignWave] {
        &self.schedule.waves
    }

    /// All records emitted so far, month-major then account id.
    pub fn panel(&self) -> &[AccountMonthRecord] {
        &self.records
    }

    /// Carried state as of the last completed month.
    pub fn states(&self) -> &[AccountState] {
        &self.states
    }

    pub fn month_summaries(&self) -> &[MonthSummary] {
        &self.summaries
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn did_ready(&self) -> Vec<DidReadyRecord> {
        did_ready::reduce(&self.records)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::compute(self.clock.current_month, &self.states, &self.records)
    }

    pub fn into_output(self) -> SimOutput {
        let summary = self.summary();
        let did_ready = self.did_ready();
        SimOutput {
            run_id:    self.run_id,
            config:    self.config,
            accounts:  self.accounts,
            campaigns: self.schedule.waves,
            panel:     self.records,
            did_ready,
            events:    self.events,
            summary,
        }
    }
}

/// Build, run to the horizon, and hand back every table.
pub fn generate(run_id: RunId, config: SimConfig) -> SimResult<SimOutput> {
    let mut engine = SimEngine::build(run_id, config)?;
    engine.run()?;
    Ok(engine.into_output())
}

/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct SimOutput {
    pub run_id:    RunId,
    pub config:    SimConfig,
    pub accounts:  Vec<AccountRecord>,
    pub campaigns: Vec<CampaignWave>,
    pub panel:     Vec<AccountMonthRecord>,
    pub did_ready: Vec<DidReadyRecord>,
    pub events:    Vec<SimEvent>,
    pub summary:   RunSummary,
}

/// Descriptive end-of-run counts. No estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub months_simulated:      Month,
    pub accounts:              usize,
    pub panel_rows:            usize,
    pub treated_accounts:      usize,
    pub invested_accounts:     usize,
    pub closed_accounts:       usize,
    pub exposures_by_channel:  [u64; 3],
    pub total_invest_amount:   f64,
    /// Share of ever-exposed accounts that invested.
    pub invest_rate_treated:   Option<f64>,
    /// Share of never-exposed accounts that invested.
    pub invest_rate_untreated: Option<f64>,
}

impl RunSummary {
    fn compute(months: Month, states: &[AccountState], records: &[AccountMonthRecord]) -> Self {
        let treated = states.iter().filter(|s| s.treated()).count();
        let untreated = states.len() - treated;
        let invested_treated = states.iter().filter(|s| s.treated() && s.invested_status).count();
        let invested = states.iter().filter(|s| s.invested_status).count();

        let mut exposures_by_channel = [0u64; 3];
        let mut total_invest_amount = 0.0;
        for r in records {
            for channel in Channel::ALL {
                if r.exposed(channel) {
                    exposures_by_channel[channel.index()] += 1;
                }
            }
            total_invest_amount += r.invest_amount;
        }

        Self {
            months_simulated: months,
            accounts: states.len(),
            panel_rows: records.len(),
            treated_accounts: treated,
            invested_accounts: invested,
            closed_accounts: states.iter().filter(|s| s.account_closed).count(),
            exposures_by_channel,
            total_invest_amount,
            invest_rate_treated: share(invested_treated, treated),
            invest_rate_untreated: share(invested - invested_treated, untreated),
        }
    }
}

fn share(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

fn summarize_month(records: &[AccountMonthRecord]) -> MonthSummary {
    let mut s = MonthSummary::default();
    for r in records {
        s.active += u64::from(r.active_flag);
        s.eligible += u64::from(r.eligible_flag);
        s.assigned += u64::from(Channel::ALL.iter().any(|c| r.nudged(*c)));
        s.exposed += u64::from(r.treatment_any);
        s.contaminated += u64::from(Channel::ALL.iter().any(|c| r.exposed(*c) && !r.nudged(*c)));
        s.invested_true += u64::from(r.invested_true);
        s.invested_reported += u64::from(r.invested_flag);
        s.invested_to_date += u64::from(r.invested_status);
        s.closed_to_date += u64::from(r.account_closed);
    }
    s
}
