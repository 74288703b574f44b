//! Account generator: static attributes for every simulated account.
//!
//! Runs once, before any month is simulated. Accounts are drawn
//! independently and in id order from the account stream, with a fixed
//! draw order per account (rollover, balance, age, tenure, risk,
//! engagement, advisor, region, email, sms, preferred channel, latent).

use crate::{
    config::SimConfig,
    error::{SimError, SimResult},
    rng::SubsystemRng,
    types::{
        flag, AccountId, AgeBand, Channel, Month, Region, RiskTolerance, TenureBand,
        PREFERRED_CHANNEL_WEIGHTS,
    },
};
use rand_distr::{Beta, LogNormal, Normal};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountRecord {
    pub account_id:               AccountId,
    pub rollover_month:           Month,
    pub baseline_balance:         f64,
    pub age_band:                 AgeBand,
    pub tenure_band:              TenureBand,
    pub risk_tolerance:           RiskTolerance,
    pub digital_engagement_score: f64,
    #[serde(serialize_with = "flag")]
    pub advisor_flag:             bool,
    pub region:                   Region,
    #[serde(serialize_with = "flag")]
    pub contactable_email:        bool,
    #[serde(serialize_with = "flag")]
    pub contactable_sms:          bool,
    pub preferred_channel:        Channel,
    /// Persistent unobserved propensity offset added to every month's logit.
    pub latent_effect:            f64,
}

impl AccountRecord {
    /// In-app messages need no opt-in.
    pub fn contactable(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.contactable_email,
            Channel::Sms   => self.contactable_sms,
            Channel::InApp => true,
        }
    }

    /// Signed months elapsed since rollover; negative before it.
    pub fn months_since_rollover(&self, month: Month) -> i32 {
        month as i32 - self.rollover_month as i32
    }
}

pub struct AccountSubsystem {
    config:     SimConfig,
    balance:    LogNormal<f64>,
    engagement: Beta<f64>,
    latent:     Normal<f64>,
}

impl AccountSubsystem {
    pub fn new(config: &SimConfig) -> SimResult<Self> {
        let p = &config.population;
        let balance = LogNormal::new(p.balance_log_mean, p.balance_log_sigma)
            .map_err(|e| SimError::invalid("population.balance_log_sigma", e.to_string()))?;
        let engagement = Beta::new(p.engagement_alpha, p.engagement_beta)
            .map_err(|e| SimError::invalid("population.engagement_alpha", e.to_string()))?;
        let latent = Normal::new(0.0, p.latent_effect_sd)
            .map_err(|e| SimError::invalid("population.latent_effect_sd", e.to_string()))?;
        Ok(Self {
            config: config.clone(),
            balance,
            engagement,
            latent,
        })
    }

    /// Draw the full population, ids 1..=n_accounts.
    pub fn generate(&self, rng: &mut SubsystemRng) -> Vec<AccountRecord> {
        let n = self.config.n_accounts;
        let mut accounts = Vec::with_capacity(n);
        for i in 0..n {
            accounts.push(self.generate_one(i as AccountId + 1, rng));
        }
        log::info!("account: generated {n} accounts");
        accounts
    }

    fn generate_one(&self, account_id: AccountId, rng: &mut SubsystemRng) -> AccountRecord {
        let cfg = &self.config;
        let p = &cfg.population;

        let rollover_month = rng.next_in_range(cfg.rollover_start, cfg.rollover_end);
        let baseline_balance = rng
            .sample(&self.balance)
            .clamp(p.balance_min, p.balance_max);
        let age_band = rng.pick_weighted(&AgeBand::WEIGHTED);
        let tenure_band = rng.pick_weighted(&TenureBand::WEIGHTED);
        let risk_tolerance = rng.pick_weighted(&RiskTolerance::WEIGHTED);
        let digital_engagement_score = rng.sample(&self.engagement);
        let advisor_flag = rng.chance(p.advisor_rate);
        let region = rng.pick(&Region::ALL);
        let contactable_email = rng.chance(p.email_contact_rate);
        let contactable_sms = rng.chance(p.sms_contact_rate);
        let preferred_channel = rng.pick_weighted(&PREFERRED_CHANNEL_WEIGHTS);
        let latent_effect = rng.sample(&self.latent);

        AccountRecord {
            account_id,
            rollover_month,
            baseline_balance,
            age_band,
            tenure_band,
            risk_tolerance,
            digital_engagement_score,
            advisor_flag,
            region,
            contactable_email,
            contactable_sms,
            preferred_channel,
            latent_effect,
        }
    }
}
