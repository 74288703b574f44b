//! Run configuration.
//!
//! Every knob of the generator lives here with its calibrated default.
//! A JSON file may override any subset of fields; absent keys keep the
//! default. CLI flags are applied on top by the binary.

use crate::{
    error::{SimError, SimResult},
    types::{Channel, Month, Region},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Account ids are u32; the population must fit.
pub const MAX_ACCOUNTS: usize = u32::MAX as usize;

/// Months since rollover is signed, so every month must fit in an i32.
pub const MAX_MONTH: Month = i32::MAX as Month;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub seed:                    u64,
    pub n_accounts:              usize,
    pub n_months:                Month,
    pub rollover_start:          Month,
    pub rollover_end:            Month,
    pub close_rate:              f64,
    pub contam_rate:             f64,
    pub missing_engagement_rate: f64,
    pub missing_market_rate:     f64,
    pub label_noise_rate:        f64,
    pub population:              PopulationConfig,
    pub campaign:                CampaignConfig,
    pub market:                  MarketConfig,
    pub response:                ResponseModel,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed:                    42,
            n_accounts:              50_000,
            n_months:                36,
            rollover_start:          1,
            rollover_end:            12,
            close_rate:              0.001,
            contam_rate:             0.03,
            missing_engagement_rate: 0.05,
            missing_market_rate:     0.02,
            label_noise_rate:        0.01,
            population:              PopulationConfig::default(),
            campaign:                CampaignConfig::default(),
            market:                  MarketConfig::default(),
            response:                ResponseModel::default(),
        }
    }
}

// ── Population ─────────────────────────────────────────────────────

/// Static attribute distributions for the account generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Lognormal location of the balance (log-dollars).
    pub balance_log_mean:   f64,
    pub balance_log_sigma:  f64,
    pub balance_min:        f64,
    pub balance_max:        f64,
    pub engagement_alpha:   f64,
    pub engagement_beta:    f64,
    pub advisor_rate:       f64,
    pub email_contact_rate: f64,
    pub sms_contact_rate:   f64,
    pub latent_effect_sd:   f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            balance_log_mean:   10.3,
            balance_log_sigma:  0.8,
            balance_min:        1_000.0,
            balance_max:        500_000.0,
            engagement_alpha:   2.0,
            engagement_beta:    5.0,
            advisor_rate:       0.25,
            email_contact_rate: 0.85,
            sms_contact_rate:   0.55,
            latent_effect_sd:   0.5,
        }
    }
}

// ── Campaigns ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    /// Months added to a wave's start to get its end, before capping.
    pub wave_duration:    Month,
    pub eligibility_rule: String,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            wave_duration:    12,
            eligibility_rule: "months_since_rollover in [1,6] and not invested".into(),
        }
    }
}

// ── Market ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub return_mean:          f64,
    pub return_sd:            f64,
    /// Calendar-month pattern, January first. Must hold 12 entries.
    pub seasonality_template: Vec<f64>,
    pub seasonality_scale:    f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            return_mean:          0.004,
            return_sd:            0.03,
            seasonality_template: vec![
                0.20, 0.10, 0.05, 0.00, -0.05, 0.00, 0.05, 0.05, 0.00, 0.05, 0.10, 0.20,
            ],
            seasonality_scale:    0.10,
        }
    }
}

// ── Behavioural response ──────────────────────────────────────────

/// Open/view probability and treatment weight for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelResponse {
    pub open_base:         f64,
    pub open_engagement:   f64,
    pub open_cap:          f64,
    pub treatment_weight:  f64,
}

impl ChannelResponse {
    pub fn email() -> Self {
        Self { open_base: 0.35, open_engagement: 0.25, open_cap: 0.95, treatment_weight: 0.35 }
    }

    pub fn sms() -> Self {
        Self { open_base: 0.55, open_engagement: 0.20, open_cap: 0.98, treatment_weight: 0.45 }
    }

    pub fn inapp() -> Self {
        Self { open_base: 0.45, open_engagement: 0.30, open_cap: 0.98, treatment_weight: 0.30 }
    }

    pub fn open_probability(&self, engagement: f64) -> f64 {
        (self.open_base + self.open_engagement * engagement).clamp(0.0, self.open_cap)
    }
}

/// A channel section as written in a config file: any subset of fields.
#[derive(Debug, Deserialize)]
struct ChannelResponsePatch {
    open_base:        Option<f64>,
    open_engagement:  Option<f64>,
    open_cap:         Option<f64>,
    treatment_weight: Option<f64>,
}

impl ChannelResponsePatch {
    fn apply(self, base: ChannelResponse) -> ChannelResponse {
        ChannelResponse {
            open_base:        self.open_base.unwrap_or(base.open_base),
            open_engagement:  self.open_engagement.unwrap_or(base.open_engagement),
            open_cap:         self.open_cap.unwrap_or(base.open_cap),
            treatment_weight: self.treatment_weight.unwrap_or(base.treatment_weight),
        }
    }
}

fn email_response<'de, D: Deserializer<'de>>(d: D) -> Result<ChannelResponse, D::Error> {
    Ok(ChannelResponsePatch::deserialize(d)?.apply(ChannelResponse::email()))
}

fn sms_response<'de, D: Deserializer<'de>>(d: D) -> Result<ChannelResponse, D::Error> {
    Ok(ChannelResponsePatch::deserialize(d)?.apply(ChannelResponse::sms()))
}

fn inapp_response<'de, D: Deserializer<'de>>(d: D) -> Result<ChannelResponse, D::Error> {
    Ok(ChannelResponsePatch::deserialize(d)?.apply(ChannelResponse::inapp()))
}

/// Weights of the investment-decision logit, excluding treatment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvestmentLogit {
    pub intercept:             f64,
    pub log_balance:           f64,
    pub engagement:            f64,
    pub months_since_rollover: f64,
    pub market_return:         f64,
    pub advisor:               f64,
}

impl Default for InvestmentLogit {
    fn default() -> Self {
        Self {
            intercept:             -4.2,
            log_balance:           0.35,
            engagement:            0.60,
            months_since_rollover: -0.10,
            market_return:         0.20,
            advisor:               0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseModel {
    pub assign_base:             f64,
    pub assign_engagement:       f64,
    pub assign_balance_threshold: f64,
    pub assign_balance_bonus:    f64,
    /// Channel sections merge field by field over that channel's defaults.
    #[serde(deserialize_with = "email_response")]
    pub email:                   ChannelResponse,
    #[serde(deserialize_with = "sms_response")]
    pub sms:                     ChannelResponse,
    #[serde(deserialize_with = "inapp_response")]
    pub inapp:                   ChannelResponse,
    /// Subtracted once per exposed channel beyond the first.
    pub multi_channel_penalty:   f64,
    pub logit:                   InvestmentLogit,
    pub eligibility_min_months:  i32,
    pub eligibility_max_months:  i32,
    pub allocation_alpha:        f64,
    pub allocation_beta:         f64,
}

impl Default for ResponseModel {
    fn default() -> Self {
        Self {
            assign_base:              0.05,
            assign_engagement:        0.10,
            assign_balance_threshold: 50_000.0,
            assign_balance_bonus:     0.05,
            email:                    ChannelResponse::email(),
            sms:                      ChannelResponse::sms(),
            inapp:                    ChannelResponse::inapp(),
            multi_channel_penalty:    0.15,
            logit:                    InvestmentLogit::default(),
            eligibility_min_months:   1,
            eligibility_max_months:   6,
            allocation_alpha:         5.0,
            allocation_beta:          2.0,
        }
    }
}

impl ResponseModel {
    pub fn channel(&self, channel: Channel) -> &ChannelResponse {
        match channel {
            Channel::Email => &self.email,
            Channel::Sms   => &self.sms,
            Channel::InApp => &self.inapp,
        }
    }

    pub fn assignment_probability(&self, engagement: f64, balance: f64) -> f64 {
        let bonus = if balance > self.assign_balance_threshold {
            self.assign_balance_bonus
        } else {
            0.0
        };
        self.assign_base + self.assign_engagement * engagement + bonus
    }
}

// ── Loading and validation ────────────────────────────────────────

/// Values given directly on the command line. Each one set wins over
/// both the config file and the defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub seed:       Option<u64>,
    pub n_accounts: Option<usize>,
    pub n_months:   Option<Month>,
}

impl ConfigOverrides {
    pub fn apply(&self, mut config: SimConfig) -> SimConfig {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(n_accounts) = self.n_accounts {
            config.n_accounts = n_accounts;
        }
        if let Some(n_months) = self.n_months {
            config.n_months = n_months;
        }
        config
    }
}

impl SimConfig {
    /// Load from a JSON file. Keys not present keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let config: SimConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Defaults, then the optional JSON file, then `overrides`.
    pub fn resolve(path: Option<&Path>, overrides: &ConfigOverrides) -> anyhow::Result<Self> {
        let base = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        Ok(overrides.apply(base))
    }

    /// Small population for tests: 200 accounts over 24 months.
    pub fn default_test() -> Self {
        Self {
            n_accounts: 200,
            n_months: 24,
            ..Self::default()
        }
    }

    /// Reject configurations that cannot produce a well-formed panel.
    /// Called before any generation begins.
    pub fn validate(&self) -> SimResult<()> {
        if self.n_accounts == 0 {
            return Err(SimError::invalid("n_accounts", "must be positive"));
        }
        if self.n_accounts > MAX_ACCOUNTS {
            return Err(SimError::invalid(
                "n_accounts",
                format!("must not exceed {}", MAX_ACCOUNTS),
            ));
        }
        if self.n_months == 0 {
            return Err(SimError::invalid("n_months", "must be positive"));
        }
        if self.n_months > MAX_MONTH {
            return Err(SimError::invalid("n_months", format!("must not exceed {MAX_MONTH}")));
        }
        if self.rollover_start == 0 {
            return Err(SimError::invalid("rollover_start", "must be at least 1"));
        }
        if self.rollover_start > self.rollover_end {
            return Err(SimError::invalid(
                "rollover_start",
                format!("{} exceeds rollover_end {}", self.rollover_start, self.rollover_end),
            ));
        }
        if self.rollover_end > MAX_MONTH {
            return Err(SimError::invalid("rollover_end", format!("must not exceed {MAX_MONTH}")));
        }
        if latest_wave_start()
            .checked_add(self.campaign.wave_duration)
            .map_or(true, |end| end > MAX_MONTH)
        {
            return Err(SimError::invalid(
                "campaign.wave_duration",
                format!("{} runs past month {MAX_MONTH}", self.campaign.wave_duration),
            ));
        }

        check_rate("close_rate", self.close_rate)?;
        check_rate("contam_rate", self.contam_rate)?;
        check_rate("missing_engagement_rate", self.missing_engagement_rate)?;
        check_rate("missing_market_rate", self.missing_market_rate)?;
        check_rate("label_noise_rate", self.label_noise_rate)?;

        let p = &self.population;
        check_positive("population.balance_log_sigma", p.balance_log_sigma)?;
        check_positive("population.balance_min", p.balance_min)?;
        if p.balance_min > p.balance_max {
            return Err(SimError::invalid(
                "population.balance_min",
                format!("{} exceeds balance_max {}", p.balance_min, p.balance_max),
            ));
        }
        check_positive("population.engagement_alpha", p.engagement_alpha)?;
        check_positive("population.engagement_beta", p.engagement_beta)?;
        check_rate("population.advisor_rate", p.advisor_rate)?;
        check_rate("population.email_contact_rate", p.email_contact_rate)?;
        check_rate("population.sms_contact_rate", p.sms_contact_rate)?;
        if !(p.latent_effect_sd >= 0.0 && p.latent_effect_sd.is_finite()) {
            return Err(SimError::invalid("population.latent_effect_sd", "must be finite and >= 0"));
        }

        if !(self.market.return_sd >= 0.0 && self.market.return_sd.is_finite()) {
            return Err(SimError::invalid("market.return_sd", "must be finite and >= 0"));
        }
        if self.market.seasonality_template.len() != 12 {
            return Err(SimError::invalid(
                "market.seasonality_template",
                format!("must hold 12 entries, got {}", self.market.seasonality_template.len()),
            ));
        }

        let r = &self.response;
        if r.eligibility_min_months > r.eligibility_max_months {
            return Err(SimError::invalid(
                "response.eligibility_min_months",
                "eligibility window is empty",
            ));
        }
        check_positive("response.allocation_alpha", r.allocation_alpha)?;
        check_positive("response.allocation_beta", r.allocation_beta)?;
        for channel in Channel::ALL {
            let c = r.channel(channel);
            if !(0.0..=1.0).contains(&c.open_cap) {
                return Err(SimError::invalid("response.open_cap", format!("{channel} cap outside [0, 1]")));
            }
        }

        Ok(())
    }
}

/// Start month of the last wave the scheduler lays out.
fn latest_wave_start() -> Month {
    Region::ALL
        .iter()
        .flat_map(|r| Channel::ALL.iter().map(move |c| r.base_start_month() + c.start_offset()))
        .max()
        .unwrap_or(0)
}

fn check_rate(field: &'static str, value: f64) -> SimResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimError::invalid(field, format!("{value} outside [0, 1]")))
    }
}

fn check_positive(field: &'static str, value: f64) -> SimResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(SimError::invalid(field, format!("{value} must be positive")))
    }
}
